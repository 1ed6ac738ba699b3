// ABOUTME: ExtractionResult returned by every extraction, plus MissReason explaining an empty result.
// ABOUTME: A miss never changes the result shape: content and next page are both absent.

use serde::Serialize;

use crate::error::{ErrorCode, ExtractError};

/// Why an extraction produced no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissReason {
    /// The page could not be fetched.
    Fetch { code: ErrorCode, message: String },
    /// The server answered with a non-success status.
    Status { status: u16 },
    /// No rule matched the URL and yielded content.
    NoMatchingRule,
}

/// The outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Outer HTML of the matched nodes, in document order.
    pub content: Option<String>,
    /// Final URL after redirects.
    pub resolved_url: String,
    /// Absolute URL of the next page. Always `None` when `content` is `None`.
    pub next_page_url: Option<String>,
    /// Index of the winning rule in the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miss: Option<MissReason>,
}

impl ExtractionResult {
    pub fn found(
        content: String,
        resolved_url: impl Into<String>,
        next_page_url: Option<String>,
        rule_index: usize,
    ) -> Self {
        Self {
            content: Some(content),
            resolved_url: resolved_url.into(),
            next_page_url,
            rule_index: Some(rule_index),
            miss: None,
        }
    }

    pub fn not_found(resolved_url: impl Into<String>, reason: MissReason) -> Self {
        Self {
            content: None,
            resolved_url: resolved_url.into(),
            next_page_url: None,
            rule_index: None,
            miss: Some(reason),
        }
    }

    /// Folds a fetch failure into a "not found" result.
    ///
    /// A status miss keeps the URL the response came from; any other failure
    /// reports `requested_url`.
    pub fn from_error(requested_url: impl Into<String>, err: &ExtractError) -> Self {
        match (err.code, err.status) {
            (ErrorCode::Status, Some(status)) => {
                Self::not_found(err.url.clone(), MissReason::Status { status })
            }
            (code, _) => Self::not_found(
                requested_url,
                MissReason::Fetch {
                    code,
                    message: err.to_string(),
                },
            ),
        }
    }

    pub fn is_found(&self) -> bool {
        self.content.is_some()
    }
}
