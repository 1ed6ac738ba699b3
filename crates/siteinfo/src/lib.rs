// ABOUTME: Site rule catalogs for full-content extraction.
// ABOUTME: Provides rule models, the catalog builder, and the Wedata source client.

pub mod catalog;
pub mod error;
pub mod models;
pub mod wedata;

pub use catalog::{build_catalog, build_catalog_at, compare_ldr_full_feed_items, type_priority};
pub use error::SiteinfoError;
pub use models::{parse_user_rules, RuleCatalog, SiteRule, UserRule};
pub use wedata::{
    AutoPagerizeData, LdrFullFeedData, WedataClient, WedataItem, AUTOPAGERIZE_ITEMS_URL,
    LDR_FULL_FEED_ITEMS_URL,
};
