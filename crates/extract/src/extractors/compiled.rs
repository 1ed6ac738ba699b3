// ABOUTME: Rule catalog with URL patterns compiled once up front.
// ABOUTME: Invalid patterns are kept as "never matches" so catalog indices stay stable.

//! Pattern compilation for repeated extractions.
//!
//! A shared catalog carries thousands of URL patterns. Compiling them per
//! extraction dominates the cost of a rule scan, so callers that extract
//! more than one page should build a [`CompiledCatalog`] once and reuse it.
//!
//! Rule sources write patterns for JavaScript `RegExp`, so lookaround and
//! backreferences are accepted through `fancy-regex`.

use std::borrow::Cow;

use fancy_regex::Regex;
use fullfeed_siteinfo::{RuleCatalog, SiteRule};

/// Compiles a rule's URL pattern. Returns `None` for an invalid pattern.
pub fn compile_pattern(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            tracing::debug!(pattern, error = %err, "skipping rule with invalid URL pattern");
            None
        }
    }
}

/// A catalog whose URL patterns have been compiled.
///
/// Immutable once built; share it behind an `Arc` for concurrent use.
#[derive(Debug, Clone)]
pub struct CompiledCatalog {
    catalog: RuleCatalog,
    patterns: Vec<Option<Regex>>,
}

impl CompiledCatalog {
    pub fn new(catalog: RuleCatalog) -> Self {
        let patterns = catalog
            .iter()
            .map(|rule| compile_pattern(&rule.url_pattern))
            .collect();
        Self { catalog, patterns }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Number of rules whose URL pattern failed to compile.
    pub fn invalid_patterns(&self) -> usize {
        self.patterns.iter().filter(|p| p.is_none()).count()
    }

    /// Rules in catalog order with their compiled patterns.
    pub(crate) fn rules(&self) -> impl Iterator<Item = CandidateRule<'_>> {
        self.catalog
            .iter()
            .zip(&self.patterns)
            .enumerate()
            .map(|(index, (rule, pattern))| CandidateRule {
                index,
                rule,
                pattern: pattern.as_ref().map(Cow::Borrowed),
            })
    }
}

impl From<RuleCatalog> for CompiledCatalog {
    fn from(catalog: RuleCatalog) -> Self {
        Self::new(catalog)
    }
}

/// One rule offered to the scan, with its pattern compiled or borrowed.
pub(crate) struct CandidateRule<'c> {
    pub index: usize,
    pub rule: &'c SiteRule,
    /// `None` when the pattern does not compile.
    pub pattern: Option<Cow<'c, Regex>>,
}

impl CandidateRule<'_> {
    /// Tests `url` against the rule's pattern.
    ///
    /// An invalid pattern never matches, and neither does one that gives up
    /// while matching (backtracking limit).
    pub fn matches(&self, url: &str) -> bool {
        let Some(pattern) = self.pattern.as_deref() else {
            return false;
        };
        match pattern.is_match(url) {
            Ok(matched) => matched,
            Err(err) => {
                tracing::debug!(
                    rule_index = self.index,
                    url,
                    error = %err,
                    "URL pattern failed while matching"
                );
                false
            }
        }
    }
}

/// Compiles patterns lazily while a plain catalog is scanned.
pub(crate) fn lazy_rules(catalog: &RuleCatalog) -> impl Iterator<Item = CandidateRule<'_>> {
    catalog.iter().enumerate().map(|(index, rule)| CandidateRule {
        index,
        rule,
        pattern: compile_pattern(&rule.url_pattern).map(Cow::Owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RuleCatalog {
        RuleCatalog::new(
            vec![
                SiteRule::new(r"^https?://example\.com/", "//article", ""),
                SiteRule::new("(unclosed", "//div", ""),
                SiteRule::new(r"news\.example\.org", "//main", "//a[@rel='next']"),
            ],
            None,
        )
    }

    #[test]
    fn test_invalid_patterns_are_kept_as_non_matching() {
        let compiled = CompiledCatalog::new(catalog());
        assert_eq!(compiled.len(), 3);
        assert_eq!(compiled.invalid_patterns(), 1);

        let rules: Vec<_> = compiled.rules().collect();
        assert_eq!(rules[1].index, 1);
        assert!(rules[1].pattern.is_none());
        assert!(!rules[1].matches("https://example.com/"));
        assert!(rules[2].matches("https://news.example.org/a"));
    }

    #[test]
    fn test_lazy_rules_match_compiled_rules() {
        let catalog = catalog();
        let compiled = CompiledCatalog::new(catalog.clone());
        let lazy: Vec<bool> = lazy_rules(&catalog).map(|r| r.pattern.is_some()).collect();
        let eager: Vec<bool> = compiled.rules().map(|r| r.pattern.is_some()).collect();
        assert_eq!(lazy, eager);
    }

    #[test]
    fn test_patterns_are_unanchored() {
        let regex = compile_pattern(r"example\.com/blog").expect("valid pattern");
        assert!(regex.is_match("https://www.example.com/blog/2024/01/post").unwrap());
    }

    #[test]
    fn test_javascript_style_patterns() {
        let lookahead =
            compile_pattern(r"^https?://example\.com/(?!tag/)").expect("lookahead compiles");
        assert!(lookahead.is_match("https://example.com/article/article").unwrap());
        assert!(!lookahead.is_match("https://example.com/tag/rust").unwrap());

        let backreference =
            compile_pattern(r"^https?://example\.com/(\w+)/\1$").expect("backreference compiles");
        assert!(backreference.is_match("https://example.com/article/article").unwrap());
        assert!(!backreference.is_match("https://example.com/article/other").unwrap());

        let escaped_slashes =
            compile_pattern(r"^https?:\/\/example\.com\/").expect("escaped slashes compile");
        assert!(escaped_slashes.is_match("https://example.com/a").unwrap());
    }

    #[test]
    fn test_matching_failure_is_no_match() {
        let catalog = RuleCatalog::new(vec![SiteRule::new(r"^(a+)+\1$", "//div", "")], None);
        let rule = lazy_rules(&catalog).next().expect("one rule");
        assert!(rule.pattern.is_some());
        assert!(!rule.matches(&format!("{}b", "a".repeat(64))));
    }
}
