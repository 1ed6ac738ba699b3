// ABOUTME: Rule-driven extraction helpers: compiled catalogs and XPath-based node selection.
// ABOUTME: The Extractor in client.rs drives these per fetched page.

//! Extraction building blocks.
//!
//! Submodules:
//! - `compiled`: catalogs with URL patterns compiled once.
//! - `select`: content serialization and next-link resolution for XPath selections.

pub mod compiled;
pub mod select;
