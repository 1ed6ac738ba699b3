// ABOUTME: Rule models for full-content extraction: SiteRule, RuleCatalog, and UserRule.
// ABOUTME: Serialized as camelCase JSON so catalogs can be stored and exchanged as files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SiteinfoError;

/// One site-specific extraction rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRule {
    /// Regular expression tested against the page's final URL.
    pub url_pattern: String,
    /// XPath expression selecting the article content.
    pub content_path: String,
    /// XPath expression selecting the next-page anchor, empty when the site has none.
    #[serde(default)]
    pub next_link_path: String,
}

impl SiteRule {
    pub fn new(
        url_pattern: impl Into<String>,
        content_path: impl Into<String>,
        next_link_path: impl Into<String>,
    ) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            content_path: content_path.into(),
            next_link_path: next_link_path.into(),
        }
    }

    /// Returns true if the rule declares a next-page expression.
    pub fn has_next_link(&self) -> bool {
        !self.next_link_path.is_empty()
    }
}

/// An ordered list of rules. Earlier rules take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCatalog {
    pub items: Vec<SiteRule>,
    /// When the catalog was built from its sources; `None` for hand-made catalogs.
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl RuleCatalog {
    pub fn new(items: Vec<SiteRule>, last_updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            items,
            last_updated_at,
        }
    }

    /// A catalog without rules. Every extraction against it yields "not found".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SiteRule> {
        self.items.iter()
    }

    /// Returns a new catalog with the user's rules placed ahead of this catalog's rules.
    ///
    /// User rules keep their given order. The timestamp of this catalog is kept.
    pub fn with_user_rules(&self, user_rules: &[UserRule]) -> RuleCatalog {
        let mut items = Vec::with_capacity(user_rules.len() + self.items.len());
        items.extend(user_rules.iter().map(SiteRule::from));
        items.extend(self.items.iter().cloned());
        RuleCatalog {
            items,
            last_updated_at: self.last_updated_at,
        }
    }

    /// Parses a catalog from its JSON representation.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, SiteinfoError> {
        serde_json::from_slice(bytes).map_err(SiteinfoError::parse)
    }

    /// Serializes the catalog as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, SiteinfoError> {
        serde_json::to_string_pretty(self).map_err(SiteinfoError::parse)
    }
}

impl<'a> IntoIterator for &'a RuleCatalog {
    type Item = &'a SiteRule;
    type IntoIter = std::slice::Iter<'a, SiteRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A rule written by the user rather than downloaded from a shared source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRule {
    /// Creation time in milliseconds, used as a stable identifier.
    pub id: i64,
    pub name: String,
    pub url_pattern: String,
    pub content_expression: String,
    #[serde(default)]
    pub next_link_expression: String,
}

impl From<&UserRule> for SiteRule {
    fn from(rule: &UserRule) -> Self {
        SiteRule {
            url_pattern: rule.url_pattern.clone(),
            content_path: rule.content_expression.clone(),
            next_link_path: rule.next_link_expression.clone(),
        }
    }
}

/// Parses a list of user rules from JSON.
pub fn parse_user_rules(bytes: &[u8]) -> Result<Vec<UserRule>, SiteinfoError> {
    serde_json::from_slice(bytes).map_err(SiteinfoError::parse)
}
