// ABOUTME: Library entry point for fullfeed full-content extraction.
// ABOUTME: Re-exports the public API: Extractor, ExtractorBuilder, ExtractionResult, CompiledCatalog, Article.

//! Full-content extraction for feed entries.
//!
//! Given an entry URL and a catalog of site rules, the [`Extractor`] fetches
//! the page, decodes it, and returns the markup selected by the first rule
//! whose URL pattern matches and whose content expression yields something.
//!
//! # Example
//!
//! ```no_run
//! use fullfeed_extract::{Extractor, ExtractError};
//! use fullfeed_siteinfo::{RuleCatalog, SiteRule};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ExtractError> {
//!     let catalog = RuleCatalog::new(
//!         vec![SiteRule::new(r"^https://example\.com/", "//article", "//a[@rel='next']")],
//!         None,
//!     );
//!     let extractor = Extractor::builder().build()?;
//!     let result = extractor.extract("https://example.com/post/1", &catalog).await;
//!     if let Some(content) = result.content {
//!         println!("{}", content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod charset;
pub mod client;
pub mod error;
pub mod extractors;
pub mod options;
pub mod paginate;
pub mod resource;
pub mod result;
pub mod xpath;

pub use crate::client::{extract_from_html, Extractor};
pub use crate::error::{ErrorCode, ExtractError};
pub use crate::extractors::compiled::CompiledCatalog;
pub use crate::options::{ExtractorBuilder, Options, DEFAULT_USER_AGENT};
pub use crate::paginate::{Article, DEFAULT_MAX_PAGES};
pub use crate::result::{ExtractionResult, MissReason};
pub use fullfeed_siteinfo::{RuleCatalog, SiteRule, UserRule};
