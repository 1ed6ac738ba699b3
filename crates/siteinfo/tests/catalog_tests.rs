// ABOUTME: Integration tests for building, saving and reloading rule catalogs through the public API.
// ABOUTME: Uses Wedata-shaped JSON as it appears in items_all.json downloads.

use chrono::{TimeZone, Utc};
use fullfeed_siteinfo::{
    build_catalog_at, parse_user_rules, AutoPagerizeData, LdrFullFeedData, RuleCatalog,
    WedataItem,
};
use pretty_assertions::assert_eq;

const AUTOPAGERIZE: &str = r#"[
  {"name":"Blog","resource_url":"http://wedata.net/items/10",
   "data":{"url":"^https?://blog\\.example\\.jp/","pageElement":"//div[@class='entry']","nextLink":"//a[@rel='next']","exampleUrl":"http://blog.example.jp/1"}}
]"#;

const LDR_FULL_FEED: &str = r#"[
  {"name":"Sub","resource_url":"http://wedata.net/items/20","data":{"url":"^https?://sub\\.","xpath":"//main","type":"SUBGENERAL"}},
  {"name":"Odd","resource_url":"http://wedata.net/items/21","data":{"url":"^https?://odd\\.","xpath":"//section","type":"CUSTOM"}},
  {"name":"Ind","resource_url":"http://wedata.net/items/22","data":{"url":"^https?://ind\\.","xpath":"//div[@id='article']","type":"INDIVIDUAL","enc":"EUC-JP"}}
]"#;

fn built() -> RuleCatalog {
    let primary: Vec<WedataItem<AutoPagerizeData>> = serde_json::from_str(AUTOPAGERIZE).unwrap();
    let secondary: Vec<WedataItem<LdrFullFeedData>> = serde_json::from_str(LDR_FULL_FEED).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    build_catalog_at(primary, secondary, now)
}

#[test]
fn builds_in_precedence_order() {
    let catalog = built();
    let contents: Vec<&str> = catalog.iter().map(|r| r.content_path.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "//div[@class='entry']",
            "//div[@id='article']",
            "//main",
            "//section"
        ]
    );
}

#[test]
fn saved_catalog_reloads_identically() {
    let catalog = built();
    let json = catalog.to_json_pretty().unwrap();
    assert!(json.contains("\"lastUpdatedAt\": \"2024-05-01T12:00:00Z\""));

    let reloaded = RuleCatalog::from_json_slice(json.as_bytes()).unwrap();
    assert_eq!(reloaded, catalog);
}

#[test]
fn user_rules_from_json_go_first() {
    let user_rules = parse_user_rules(
        br#"[{"id": 1714564800000, "name": "mine", "urlPattern": "^https://mine\\.example/",
               "contentExpression": "//article", "nextLinkExpression": "//a[.='Next']"}]"#,
    )
    .unwrap();

    let catalog = built();
    let merged = catalog.with_user_rules(&user_rules);
    assert_eq!(merged.len(), catalog.len() + 1);
    assert_eq!(merged.items[0].url_pattern, "^https://mine\\.example/");
    assert_eq!(merged.items[0].next_link_path, "//a[.='Next']");
    assert_eq!(merged.items[1..], catalog.items[..]);
    assert_eq!(merged.last_updated_at, catalog.last_updated_at);
}
