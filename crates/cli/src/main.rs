// ABOUTME: The fullfeed command line: extract full article content with a rule catalog, or rebuild the catalog.
// ABOUTME: `extract` works on URLs or a local HTML file; `update` downloads the Wedata sources and writes JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use fullfeed_extract::{
    charset, extract_from_html, Article, CompiledCatalog, ExtractionResult, Extractor,
    DEFAULT_USER_AGENT,
};
use fullfeed_siteinfo::{
    parse_user_rules, RuleCatalog, WedataClient, AUTOPAGERIZE_ITEMS_URL, LDR_FULL_FEED_ITEMS_URL,
};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "fullfeed", version)]
#[command(about = "Extract full article content from feed entry pages using site rules")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract article content from URLs or a saved HTML file
    Extract(ExtractArgs),
    /// Download the rule sources and write a catalog file
    Update(UpdateArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Rule catalog JSON file (as written by `fullfeed update`)
    #[arg(long, env = "FULLFEED_CATALOG")]
    catalog: PathBuf,

    /// JSON file of the user's own rules, tried before the catalog
    #[arg(long = "user-rules")]
    user_rules: Option<PathBuf>,

    /// HTML file to extract from (requires --url)
    #[arg(long)]
    html: Option<PathBuf>,

    /// URL the HTML file was fetched from (required with --html)
    #[arg(long)]
    url: Option<String>,

    /// Follow next-page links, up to this many pages per URL
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// Output full results as JSON instead of raw content
    #[arg(long)]
    json: bool,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Allow fetching from private/local networks
    #[arg(long)]
    allow_private_networks: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(long)]
    user_agent: Option<String>,

    /// URLs to extract
    #[arg()]
    urls: Vec<String>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Where to write the catalog JSON
    #[arg(short, long)]
    output: PathBuf,

    /// AutoPagerize items_all.json endpoint
    #[arg(long, default_value = AUTOPAGERIZE_ITEMS_URL)]
    autopagerize_url: String,

    /// LDRFullFeed items_all.json endpoint
    #[arg(long, default_value = LDR_FULL_FEED_ITEMS_URL)]
    ldr_full_feed_url: String,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Command::Extract(args) => run_extract(args).await,
        Command::Update(args) => run_update(args).await.map(|()| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn load_catalog(args: &ExtractArgs) -> Result<RuleCatalog> {
    let bytes = fs::read(&args.catalog)
        .with_context(|| format!("reading catalog {}", args.catalog.display()))?;
    let catalog = RuleCatalog::from_json_slice(&bytes)
        .with_context(|| format!("parsing catalog {}", args.catalog.display()))?;

    let Some(path) = &args.user_rules else {
        return Ok(catalog);
    };
    let bytes =
        fs::read(path).with_context(|| format!("reading user rules {}", path.display()))?;
    let user_rules = parse_user_rules(&bytes)
        .with_context(|| format!("parsing user rules {}", path.display()))?;
    tracing::info!(count = user_rules.len(), "loaded user rules");
    Ok(catalog.with_user_rules(&user_rules))
}

fn build_extractor(args: &ExtractArgs) -> Result<Extractor> {
    let mut builder = Extractor::builder().allow_private_networks(args.allow_private_networks);
    if let Some(secs) = args.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(user_agent) = &args.user_agent {
        builder = builder.user_agent(user_agent);
    }
    builder.build().context("building HTTP client")
}

/// Returns `Ok(false)` when any page yielded no content.
async fn run_extract(args: ExtractArgs) -> Result<bool> {
    if args.html.is_some() && args.url.is_none() {
        bail!("--url is required when using --html");
    }
    if args.html.is_none() && args.urls.is_empty() {
        bail!("at least one URL is required, or use --html with --url");
    }
    if args.html.is_some() && !args.urls.is_empty() {
        bail!("cannot use both --html and positional URLs");
    }

    let catalog = load_catalog(&args)?;
    tracing::info!(rules = catalog.len(), "loaded catalog");

    let mut articles: Vec<Article> = Vec::new();

    if let (Some(html_path), Some(url)) = (&args.html, &args.url) {
        Url::parse(url).with_context(|| format!("invalid --url {}", url))?;
        let bytes =
            fs::read(html_path).with_context(|| format!("reading {}", html_path.display()))?;
        let decoded = charset::decode(&bytes, None);
        tracing::debug!(encoding = decoded.encoding.name(), "decoded HTML file");
        articles.push(Article {
            url: url.clone(),
            pages: vec![extract_from_html(&decoded.text, url, &catalog)],
        });
    } else {
        let extractor = build_extractor(&args)?;
        let compiled = CompiledCatalog::new(catalog);
        for url in &args.urls {
            let article = if args.pages > 1 {
                extractor.extract_pages(url, &compiled, args.pages).await
            } else {
                Article {
                    url: url.clone(),
                    pages: vec![extractor.extract_compiled(url, &compiled).await],
                }
            };
            articles.push(article);
        }
    }

    let mut all_found = true;
    for article in articles.iter().filter(|a| !a.is_found()) {
        all_found = false;
        eprintln!("no content for {}", article.url);
    }

    let output = format_output(&articles, args.json, args.pages > 1)?;
    write_output(args.output.as_deref(), &output)?;
    Ok(all_found)
}

/// Renders results as raw content, or as JSON (one value for a single URL, an array otherwise).
fn format_output(articles: &[Article], json: bool, paginated: bool) -> Result<String> {
    if !json {
        return Ok(articles
            .iter()
            .filter_map(Article::content)
            .collect::<Vec<_>>()
            .join("\n\n"));
    }

    let values = articles
        .iter()
        .map(|article| {
            if paginated {
                serde_json::to_value(article)
            } else {
                let page: Option<&ExtractionResult> = article.pages.first();
                serde_json::to_value(page)
            }
        })
        .collect::<Result<Vec<Value>, _>>()?;

    let value = match <[Value; 1]>::try_from(values) {
        Ok([single]) => single,
        Err(values) => Value::Array(values),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn write_output(path: Option<&Path>, output: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
    }
}

async fn run_update(args: UpdateArgs) -> Result<()> {
    let http = reqwest::Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .context("building HTTP client")?;

    let client = WedataClient::with_urls(http, args.autopagerize_url, args.ldr_full_feed_url);
    let catalog = client
        .fetch_catalog()
        .await
        .context("downloading rule sources")?;

    let json = catalog.to_json_pretty()?;
    fs::write(&args.output, json)
        .with_context(|| format!("writing {}", args.output.display()))?;

    tracing::info!(rules = catalog.len(), path = %args.output.display(), "catalog written");
    eprintln!("wrote {} rules to {}", catalog.len(), args.output.display());
    Ok(())
}
