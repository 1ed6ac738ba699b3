// ABOUTME: Multi-page article assembly by following next-page links between extractions.
// ABOUTME: Stops at max_pages, at a page without content or next link, or when a link loops back.

use std::collections::HashSet;

use serde::Serialize;

use crate::client::Extractor;
use crate::extractors::compiled::CompiledCatalog;
use crate::result::ExtractionResult;

/// Page limit used when the caller does not choose one.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// An article assembled from one or more pages.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    /// URL the walk started from.
    pub url: String,
    /// Every page visited, in order. Only the last one can be a miss.
    pub pages: Vec<ExtractionResult>,
}

impl Article {
    /// Content of all pages, concatenated in page order.
    pub fn content(&self) -> Option<String> {
        if !self.is_found() {
            return None;
        }
        Some(
            self.pages
                .iter()
                .filter_map(|page| page.content.as_deref())
                .collect(),
        )
    }

    /// Whether the first page yielded content.
    pub fn is_found(&self) -> bool {
        self.pages.first().is_some_and(ExtractionResult::is_found)
    }

    /// A next page that was discovered but not fetched because of the page limit.
    pub fn next_page_url(&self) -> Option<&str> {
        self.pages.last().and_then(|page| page.next_page_url.as_deref())
    }
}

impl Extractor {
    /// Extracts `url` and then each discovered next page, up to `max_pages` pages.
    ///
    /// A `max_pages` of zero is treated as one.
    pub async fn extract_pages(
        &self,
        url: &str,
        catalog: &CompiledCatalog,
        max_pages: usize,
    ) -> Article {
        let max_pages = max_pages.max(1);
        let mut pages: Vec<ExtractionResult> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(url.to_string());

        while let Some(page_url) = next.take() {
            visited.insert(page_url.clone());
            let page = self.extract_compiled(&page_url, catalog).await;
            visited.insert(page.resolved_url.clone());

            if page.is_found() && pages.len() + 1 < max_pages {
                next = match page.next_page_url.as_deref() {
                    Some(link) if visited.contains(link) => {
                        tracing::debug!(url = link, "next link points to a visited page, stopping");
                        None
                    }
                    Some(link) => Some(link.to_string()),
                    None => None,
                };
            }
            pages.push(page);
        }

        tracing::debug!(url, pages = pages.len(), "multi-page extraction finished");
        Article {
            url: url.to_string(),
            pages,
        }
    }
}
