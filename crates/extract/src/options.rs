// ABOUTME: Configuration options for the extractor and the ExtractorBuilder fluent API.
// ABOUTME: Controls timeouts, user agent, private network access, headers, and body size limits.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::Extractor;
use crate::error::ExtractError;
use crate::resource::MAX_CONTENT_LENGTH;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("fullfeed/", env!("CARGO_PKG_VERSION"));

/// Configuration options for the extractor.
#[derive(Debug, Clone)]
pub struct Options {
    /// Whole-request timeout. `None` leaves latency bounds to the caller.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub http_client: Option<reqwest::Client>,
    pub headers: HashMap<String, String>,
    pub max_content_length: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_networks: false,
            http_client: None,
            headers: HashMap::new(),
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }
}

/// Builder for constructing Extractor instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct ExtractorBuilder {
    opts: Options,
}

impl ExtractorBuilder {
    /// Create a new ExtractorBuilder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a whole-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = Some(timeout);
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Use a custom HTTP client. Timeout and user agent settings are then the client's own.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Set the maximum accepted response body size in bytes.
    pub fn max_content_length(mut self, limit: usize) -> Self {
        self.opts.max_content_length = limit;
        self
    }

    /// Build the Extractor with the configured options.
    pub fn build(self) -> Result<Extractor, ExtractError> {
        Extractor::new(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert!(opts.timeout.is_none());
        assert!(!opts.allow_private_networks);
        assert!(opts.user_agent.starts_with("fullfeed/"));
        assert_eq!(opts.max_content_length, MAX_CONTENT_LENGTH);
    }

    #[test]
    fn test_builder_sets_options() {
        let builder = ExtractorBuilder::new()
            .timeout(Duration::from_secs(5))
            .user_agent("test-agent")
            .allow_private_networks(true)
            .header("Accept-Language", "ja")
            .max_content_length(1024);

        assert_eq!(builder.opts.timeout, Some(Duration::from_secs(5)));
        assert_eq!(builder.opts.user_agent, "test-agent");
        assert!(builder.opts.allow_private_networks);
        assert_eq!(
            builder.opts.headers.get("Accept-Language").map(String::as_str),
            Some("ja")
        );
        assert_eq!(builder.opts.max_content_length, 1024);
    }
}
