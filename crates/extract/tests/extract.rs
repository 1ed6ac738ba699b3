// ABOUTME: End-to-end tests: build a catalog from Wedata fixtures, then extract pages served by a mock server.
// ABOUTME: Covers source precedence, charset sniffing, pagination and the "not found" shape.

use encoding_rs::EUC_JP;
use fullfeed_extract::{CompiledCatalog, Extractor, MissReason, DEFAULT_MAX_PAGES};
use fullfeed_siteinfo::{RuleCatalog, WedataClient};
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;

fn fixture(path: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), path);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read fixture {}: {}", path, e))
}

/// Serves the Wedata fixtures and builds a catalog from them.
async fn fixture_catalog(server: &MockServer) -> RuleCatalog {
    server.mock(|when, then| {
        when.method(GET).path("/databases/AutoPagerize/items_all.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(fixture("wedata/autopagerize.json"));
    });
    server.mock(|when, then| {
        when.method(GET).path("/databases/LDRFullFeed/items_all.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(fixture("wedata/ldrfullfeed.json"));
    });

    WedataClient::with_urls(
        reqwest::Client::new(),
        server.url("/databases/AutoPagerize/items_all.json"),
        server.url("/databases/LDRFullFeed/items_all.json"),
    )
    .fetch_catalog()
    .await
    .expect("catalog builds from fixtures")
}

fn extractor() -> Extractor {
    Extractor::builder()
        .allow_private_networks(true)
        .build()
        .expect("client builds")
}

#[tokio::test]
async fn catalog_orders_sources_and_types() {
    let server = MockServer::start();
    let catalog = fixture_catalog(&server).await;

    let patterns: Vec<&str> = catalog.iter().map(|r| r.url_pattern.as_str()).collect();
    assert_eq!(
        patterns,
        vec!["/blog/entry-\\d+", "^https?://(broken", "/news/\\d+", "/news/", "."]
    );
    assert_eq!(catalog.items[0].next_link_path, "//a[@rel='next']");
    assert!(catalog.items[2..].iter().all(|r| r.next_link_path.is_empty()));
    assert!(catalog.last_updated_at.is_some());
}

#[tokio::test]
async fn primary_rule_wins_and_paginates() {
    let server = MockServer::start();
    let catalog = CompiledCatalog::new(fixture_catalog(&server).await);
    assert_eq!(catalog.invalid_patterns(), 1);

    server.mock(|when, then| {
        when.method(GET).path("/blog/entry-1");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(fixture("html/blog_entry_1.html"));
    });
    server.mock(|when, then| {
        when.method(GET).path("/blog/entry-1-2");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(fixture("html/blog_entry_1_2.html"));
    });

    let extractor = extractor();
    let first = extractor
        .extract(&server.url("/blog/entry-1"), catalog.catalog())
        .await;
    assert_eq!(first.rule_index, Some(0));
    assert_eq!(first.next_page_url, Some(server.url("/blog/entry-1-2")));
    let content = first.content.expect("first page has content");
    assert!(content.contains("First page of the entry."));
    assert!(!content.contains("Sidebar article"));

    let article = extractor
        .extract_pages(&server.url("/blog/entry-1"), &catalog, DEFAULT_MAX_PAGES)
        .await;
    assert_eq!(article.pages.len(), 2);
    let content = article.content().expect("article has content");
    let first_at = content.find("First page").expect("page one content");
    let second_at = content.find("Second page").expect("page two content");
    assert!(first_at < second_at);
}

#[tokio::test]
async fn secondary_rules_follow_type_priority() {
    let server = MockServer::start();
    let catalog = fixture_catalog(&server).await;

    let html = fixture("html/news_42.html");
    let (body, _, _) = EUC_JP.encode(&html);
    server.mock(|when, then| {
        when.method(GET).path("/news/42");
        then.status(200)
            .header("content-type", "text/html")
            .body(body.into_owned());
    });

    let result = extractor().extract(&server.url("/news/42"), &catalog).await;
    assert_eq!(result.rule_index, Some(2));
    assert_eq!(
        result.content.as_deref(),
        Some(r#"<div id="story"><p>全文配信のニュース本文です。</p></div>"#)
    );
    assert_eq!(result.next_page_url, None);
}

#[tokio::test]
async fn generic_rule_is_the_fallback() {
    let server = MockServer::start();
    let catalog = fixture_catalog(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/somewhere/else");
        then.status(200)
            .body("<html><body><article><p>Generic</p></article></body></html>");
    });

    let result = extractor()
        .extract(&server.url("/somewhere/else"), &catalog)
        .await;
    assert_eq!(result.rule_index, Some(4));
    assert_eq!(
        result.content.as_deref(),
        Some("<article><p>Generic</p></article>")
    );
}

#[tokio::test]
async fn unreachable_page_is_not_found() {
    let server = MockServer::start();
    let catalog = fixture_catalog(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/news/500");
        then.status(503);
    });

    let result = extractor().extract(&server.url("/news/500"), &catalog).await;
    assert_eq!(result.content, None);
    assert_eq!(result.next_page_url, None);
    assert_eq!(result.resolved_url, server.url("/news/500"));
    assert_eq!(result.miss, Some(MissReason::Status { status: 503 }));
}
