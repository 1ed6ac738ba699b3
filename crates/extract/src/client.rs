// ABOUTME: The Extractor: fetches a page, decodes it, and scans a rule catalog for the article content.
// ABOUTME: Every failure along the way is reported as a "not found" ExtractionResult, never as an error.

use std::net::ToSocketAddrs;

use fullfeed_siteinfo::RuleCatalog;
use scraper::Html;
use url::Url;

use crate::charset;
use crate::error::ExtractError;
use crate::extractors::compiled::{lazy_rules, CandidateRule, CompiledCatalog};
use crate::extractors::select::{extract_content_html, extract_next_link};
use crate::options::{ExtractorBuilder, Options};
use crate::resource::{fetch, FetchOptions};
use crate::result::{ExtractionResult, MissReason};
use crate::xpath::{DocumentIndex, XPath};

const MAX_REDIRECTS: usize = 10;

/// A fetched page decoded to text.
struct Page {
    resolved_url: String,
    text: String,
}

/// Full-content extractor.
///
/// Holds only immutable configuration and a shareable HTTP client, so one
/// instance can serve any number of concurrent extractions.
#[derive(Debug, Clone)]
pub struct Extractor {
    opts: Options,
    http_client: reqwest::Client,
}

impl Extractor {
    /// Create a new ExtractorBuilder for configuring an Extractor.
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::new()
    }

    /// Create an Extractor with the given options.
    ///
    /// Fails only when the HTTP client cannot be constructed.
    pub fn new(opts: Options) -> Result<Self, ExtractError> {
        let http_client = match opts.http_client.clone() {
            Some(client) => client,
            None => build_http_client(&opts)?,
        };
        Ok(Self { opts, http_client })
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Extracts the article content of `url` using the first matching rule of `catalog`.
    ///
    /// URL patterns are compiled as the scan reaches them. Use
    /// [`Extractor::extract_compiled`] when extracting many pages with one catalog.
    pub async fn extract(&self, url: &str, catalog: &RuleCatalog) -> ExtractionResult {
        match self.fetch_page(url).await {
            Ok(page) => scan_document(&page.text, &page.resolved_url, lazy_rules(catalog)),
            Err(err) => not_fetched(url, &err),
        }
    }

    /// Like [`Extractor::extract`], with URL patterns compiled ahead of time.
    pub async fn extract_compiled(&self, url: &str, catalog: &CompiledCatalog) -> ExtractionResult {
        match self.fetch_page(url).await {
            Ok(page) => scan_document(&page.text, &page.resolved_url, catalog.rules()),
            Err(err) => not_fetched(url, &err),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<Page, ExtractError> {
        let fetch_opts = FetchOptions {
            headers: self.opts.headers.clone(),
            allow_private_networks: self.opts.allow_private_networks,
            max_content_length: self.opts.max_content_length,
        };
        let fetched = fetch(&self.http_client, url, &fetch_opts).await?;
        let decoded = charset::decode(&fetched.body, fetched.content_type.as_deref());
        tracing::debug!(
            url,
            resolved_url = %fetched.final_url,
            encoding = decoded.encoding.name(),
            source = ?decoded.source,
            "decoded page"
        );
        Ok(Page {
            resolved_url: fetched.final_url,
            text: decoded.text,
        })
    }
}

fn not_fetched(url: &str, err: &ExtractError) -> ExtractionResult {
    tracing::warn!(url, error = %err, "fetch failed, reporting not found");
    ExtractionResult::from_error(url, err)
}

fn build_http_client(opts: &Options) -> Result<reqwest::Client, ExtractError> {
    let allow_private = opts.allow_private_networks;
    let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if allow_private {
            return attempt.follow();
        }
        let next = attempt.url().clone();
        let Some(host) = next.host_str() else {
            return attempt.follow();
        };
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<std::net::IpAddr>() {
            if crate::resource::is_private_ip(&ip) {
                return attempt.error("redirect to private IP blocked");
            }
            return attempt.follow();
        }
        // The policy callback is synchronous, so resolve with the blocking resolver.
        let port = next.port_or_known_default().unwrap_or(80);
        match (host, port).to_socket_addrs() {
            Ok(mut addrs) => {
                if addrs.any(|sa| crate::resource::is_private_ip(&sa.ip())) {
                    attempt.error("redirect to private IP blocked")
                } else {
                    attempt.follow()
                }
            }
            Err(_) => attempt.error("DNS lookup failed during redirect"),
        }
    });

    let mut builder = reqwest::Client::builder()
        .redirect(redirect_policy)
        .user_agent(&opts.user_agent)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .deflate(true);
    if let Some(timeout) = opts.timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ExtractError::client("Build", Some(e.into())))
}

/// Runs the rule scan over already-decoded HTML.
///
/// `resolved_url` is what URL patterns are tested against and what
/// relative next links resolve against.
pub fn extract_from_html(html: &str, resolved_url: &str, catalog: &RuleCatalog) -> ExtractionResult {
    scan_document(html, resolved_url, lazy_rules(catalog))
}

/// Parses the page and returns the result of the first rule that yields content.
fn scan_document<'c, I>(html: &str, resolved_url: &str, rules: I) -> ExtractionResult
where
    I: IntoIterator<Item = CandidateRule<'c>>,
{
    let document = Html::parse_document(html);
    let doc = DocumentIndex::new(&document);
    let context = doc.body().unwrap_or_else(|| doc.root());
    let base = Url::parse(resolved_url).ok();

    for candidate in rules {
        if !candidate.matches(resolved_url) {
            continue;
        }

        let rule = candidate.rule;
        let content = match XPath::compile(&rule.content_path)
            .and_then(|xpath| extract_content_html(&doc, context, &xpath))
        {
            Ok(content) => content,
            Err(err) => {
                tracing::debug!(
                    rule_index = candidate.index,
                    xpath = %rule.content_path,
                    error = %err,
                    "content expression selects nothing"
                );
                continue;
            }
        };
        if content.is_empty() {
            continue;
        }

        let next_page_url = if rule.has_next_link() {
            match XPath::compile(&rule.next_link_path)
                .and_then(|xpath| extract_next_link(&doc, context, &xpath, base.as_ref()))
            {
                Ok(next) => next,
                Err(err) => {
                    tracing::debug!(
                        rule_index = candidate.index,
                        xpath = %rule.next_link_path,
                        error = %err,
                        "next link expression selects nothing"
                    );
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!(
            rule_index = candidate.index,
            url_pattern = %rule.url_pattern,
            next_page_url = ?next_page_url,
            "rule matched"
        );
        return ExtractionResult::found(content, resolved_url, next_page_url, candidate.index);
    }

    tracing::debug!(resolved_url, "no rule matched");
    ExtractionResult::not_found(resolved_url, MissReason::NoMatchingRule)
}
