// ABOUTME: Wedata record types for the AutoPagerize and LDRFullFeed databases, plus an HTTP client.
// ABOUTME: WedataClient downloads both databases concurrently and builds a RuleCatalog from them.

//! Wedata rule sources.
//!
//! Wedata hosts two community-maintained rule databases:
//! - AutoPagerize: page element + next link expressions, used as primary rules.
//! - LDRFullFeed: content expressions ranked by a `type` field, used as secondary rules.
//!
//! Both are served as a JSON array of items wrapping the rule in a `data` object.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::catalog::build_catalog;
use crate::error::SiteinfoError;
use crate::models::RuleCatalog;

/// Default location of the AutoPagerize database dump.
pub const AUTOPAGERIZE_ITEMS_URL: &str = "http://wedata.net/databases/AutoPagerize/items_all.json";

/// Default location of the LDRFullFeed database dump.
pub const LDR_FULL_FEED_ITEMS_URL: &str = "http://wedata.net/databases/LDRFullFeed/items_all.json";

/// A single Wedata record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WedataItem<T> {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resource_url: String,
    #[serde(default)]
    pub database_resource_url: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub data: T,
}

/// Payload of an AutoPagerize record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPagerizeData {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub page_element: String,
    #[serde(default)]
    pub next_link: String,
    #[serde(default)]
    pub insert_before: Option<String>,
    #[serde(default)]
    pub example_url: Option<String>,
}

/// Payload of an LDRFullFeed record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LdrFullFeedData {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub xpath: String,
    /// Rule kind such as `SBM`, `IND`, `SUB` or `GEN`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub enc: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub microformats: Option<String>,
}

/// Client for the two Wedata databases.
#[derive(Debug, Clone)]
pub struct WedataClient {
    http: reqwest::Client,
    autopagerize_url: String,
    ldr_full_feed_url: String,
}

impl WedataClient {
    /// Creates a client pointing at the public Wedata endpoints.
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_urls(http, AUTOPAGERIZE_ITEMS_URL, LDR_FULL_FEED_ITEMS_URL)
    }

    /// Creates a client pointing at custom endpoints (mirrors or test servers).
    pub fn with_urls(
        http: reqwest::Client,
        autopagerize_url: impl Into<String>,
        ldr_full_feed_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            autopagerize_url: autopagerize_url.into(),
            ldr_full_feed_url: ldr_full_feed_url.into(),
        }
    }

    /// Downloads all AutoPagerize records.
    pub async fn autopagerize_items(
        &self,
    ) -> Result<Vec<WedataItem<AutoPagerizeData>>, SiteinfoError> {
        self.get_items(&self.autopagerize_url).await
    }

    /// Downloads all LDRFullFeed records.
    pub async fn ldr_full_feed_items(
        &self,
    ) -> Result<Vec<WedataItem<LdrFullFeedData>>, SiteinfoError> {
        self.get_items(&self.ldr_full_feed_url).await
    }

    /// Downloads both databases concurrently and merges them into a catalog.
    pub async fn fetch_catalog(&self) -> Result<RuleCatalog, SiteinfoError> {
        let (primary, secondary) =
            futures::try_join!(self.autopagerize_items(), self.ldr_full_feed_items())?;
        tracing::info!(
            autopagerize = primary.len(),
            ldr_full_feed = secondary.len(),
            "downloaded rule sources"
        );
        Ok(build_catalog(primary, secondary))
    }

    async fn get_items<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, SiteinfoError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SiteinfoError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SiteinfoError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SiteinfoError::fetch(url, e))?;
        serde_json::from_slice(&body).map_err(SiteinfoError::parse)
    }
}
