// ABOUTME: Builds a RuleCatalog from AutoPagerize (primary) and LDRFullFeed (secondary) records.
// ABOUTME: Secondary records are ranked by a fixed type priority table before being appended.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{RuleCatalog, SiteRule};
use crate::wedata::{AutoPagerizeData, LdrFullFeedData, WedataItem};

/// Priority of an LDRFullFeed rule type. Higher ranks first.
///
/// Unknown types have no priority and rank after every known type.
pub fn type_priority(kind: &str) -> Option<u8> {
    match kind {
        "SBM" => Some(3),
        "IND" | "INDIVIDUAL" => Some(2),
        "SUB" | "SUBGENERAL" => Some(1),
        "GEN" | "GENERAL" => Some(0),
        _ => None,
    }
}

/// Orders LDRFullFeed records by descending type priority.
pub fn compare_ldr_full_feed_items(
    a: &WedataItem<LdrFullFeedData>,
    b: &WedataItem<LdrFullFeedData>,
) -> Ordering {
    type_priority(&b.data.kind).cmp(&type_priority(&a.data.kind))
}

/// Merges the two rule sources into a catalog stamped with the current time.
pub fn build_catalog(
    primary: Vec<WedataItem<AutoPagerizeData>>,
    secondary: Vec<WedataItem<LdrFullFeedData>>,
) -> RuleCatalog {
    build_catalog_at(primary, secondary, Utc::now())
}

/// Merges the two rule sources into a catalog stamped with `now`.
///
/// Primary records keep their order. Secondary records are stably sorted by
/// [`compare_ldr_full_feed_items`] and always get an empty next-link path.
pub fn build_catalog_at(
    primary: Vec<WedataItem<AutoPagerizeData>>,
    mut secondary: Vec<WedataItem<LdrFullFeedData>>,
    now: DateTime<Utc>,
) -> RuleCatalog {
    secondary.sort_by(compare_ldr_full_feed_items);

    let mut items = Vec::with_capacity(primary.len() + secondary.len());
    items.extend(primary.into_iter().map(|item| SiteRule {
        url_pattern: item.data.url,
        content_path: item.data.page_element,
        next_link_path: item.data.next_link,
    }));
    items.extend(secondary.into_iter().map(|item| SiteRule {
        url_pattern: item.data.url,
        content_path: item.data.xpath,
        next_link_path: String::new(),
    }));

    RuleCatalog::new(items, Some(now))
}
