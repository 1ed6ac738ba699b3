// ABOUTME: Error types for loading and building site rule catalogs.
// ABOUTME: Provides SiteinfoError enum with Fetch, Status, and Parse variants.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while loading rule data.
#[derive(Debug, Error)]
pub enum SiteinfoError {
    /// The rule source could not be reached or its body could not be read.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The rule source answered with a non-success status.
    #[error("{url} responded with HTTP status {status}")]
    Status { url: String, status: u16 },

    /// The rule data was fetched but is not valid JSON of the expected shape.
    #[error("failed to parse rule data: {0}")]
    Parse(String),
}

impl SiteinfoError {
    /// Creates a Fetch error from an underlying transport error.
    pub fn fetch(url: impl Into<String>, err: impl fmt::Display) -> Self {
        SiteinfoError::Fetch {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// Creates a Parse error from an underlying deserialization error.
    pub fn parse(err: impl fmt::Display) -> Self {
        SiteinfoError::Parse(err.to_string())
    }
}
