// ABOUTME: XPath 1.0 engine over scraper's HTML tree: compile once, evaluate against any parsed document.
// ABOUTME: Exposes XPath, XPathError, Value and the DocumentIndex/XNode document model.

//! A self-contained XPath 1.0 implementation for HTML documents.
//!
//! Element and attribute names are matched ASCII case-insensitively and
//! namespace prefixes are accepted but ignored, which is what site rules
//! written for browsers expect from HTML.
//!
//! ```
//! use fullfeed_extract::xpath::{DocumentIndex, XPath};
//! use scraper::Html;
//!
//! let html = Html::parse_document("<body><div class='entry'><p>Hi</p></div></body>");
//! let doc = DocumentIndex::new(&html);
//! let xpath = XPath::compile("//div[@class='entry']").unwrap();
//! let nodes = xpath.select_nodes(&doc, doc.root()).unwrap();
//! assert_eq!(nodes.len(), 1);
//! ```

mod ast;
mod document;
mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::str::FromStr;

use ego_tree::NodeRef;
use scraper::Node;
use thiserror::Error;

pub use document::{DocumentIndex, XNode};
pub use eval::Value;

use ast::Expr;
use eval::Evaluator;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum XPathError {
    #[error("unexpected character {found:?} at offset {position}")]
    UnexpectedChar { position: usize, found: char },
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedLiteral(usize),
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown axis {0:?}")]
    UnknownAxis(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("wrong number of arguments to {name}(): {given}")]
    Arity { name: String, given: usize },
    #[error("expression does not evaluate to a node-set")]
    NotANodeSet,
    #[error("expression is nested deeper than {0} levels")]
    TooDeep(usize),
}

/// A compiled XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        let tokens = lexer::tokenize(source)?;
        let expr = parser::parse(tokens)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn evaluate<'a>(
        &self,
        doc: &DocumentIndex<'a>,
        context: NodeRef<'a, Node>,
    ) -> Result<Value<'a>, XPathError> {
        Evaluator::new(doc).evaluate(&self.expr, XNode::Node(context))
    }

    /// Evaluates the expression and requires a node-set, returned in document order.
    pub fn select_nodes<'a>(
        &self,
        doc: &DocumentIndex<'a>,
        context: NodeRef<'a, Node>,
    ) -> Result<Vec<XNode<'a>>, XPathError> {
        match self.evaluate(doc, context)? {
            Value::NodeSet(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet),
        }
    }

    pub fn select_first<'a>(
        &self,
        doc: &DocumentIndex<'a>,
        context: NodeRef<'a, Node>,
    ) -> Result<Option<XNode<'a>>, XPathError> {
        Ok(self.select_nodes(doc, context)?.into_iter().next())
    }
}

impl FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en-US">
<head><title>Sample</title></head>
<body>
  <div id="header">Site</div>
  <div id="main" class="hentry entry">
    <h2 class="title">Headline</h2>
    <div class="entry-content"><p>First</p><p>Second <a href="/x">link</a></p></div>
    <!-- trailing comment -->
  </div>
  <div class="pager"><a rel="prev" href="/p1">prev</a><a rel="next" href="/p3">next</a></div>
  <ul><li>3</li><li>4</li><li>5</li></ul>
</body>
</html>"#;

    fn with_doc<F>(f: F)
    where
        F: for<'a> FnOnce(&DocumentIndex<'a>),
    {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        f(&doc);
    }

    fn eval<'a>(doc: &DocumentIndex<'a>, xpath: &str) -> Value<'a> {
        XPath::compile(xpath)
            .unwrap()
            .evaluate(doc, doc.root())
            .unwrap()
    }

    fn names<'a>(doc: &DocumentIndex<'a>, xpath: &str) -> Vec<String> {
        XPath::compile(xpath)
            .unwrap()
            .select_nodes(doc, doc.root())
            .unwrap()
            .iter()
            .map(|n| n.name().to_string())
            .collect()
    }

    fn texts<'a>(doc: &DocumentIndex<'a>, xpath: &str) -> Vec<String> {
        XPath::compile(xpath)
            .unwrap()
            .select_nodes(doc, doc.root())
            .unwrap()
            .iter()
            .map(|n| doc.string_value(n))
            .collect()
    }

    fn string<'a>(doc: &DocumentIndex<'a>, xpath: &str) -> String {
        match eval(doc, xpath) {
            Value::String(s) => s,
            other => panic!("expected a string, got {other:?}"),
        }
    }

    fn number<'a>(doc: &DocumentIndex<'a>, xpath: &str) -> f64 {
        match eval(doc, xpath) {
            Value::Number(n) => n,
            other => panic!("expected a number, got {other:?}"),
        }
    }

    fn boolean<'a>(doc: &DocumentIndex<'a>, xpath: &str) -> bool {
        match eval(doc, xpath) {
            Value::Boolean(b) => b,
            other => panic!("expected a boolean, got {other:?}"),
        }
    }

    #[test]
    fn test_attribute_predicates() {
        with_doc(|doc| {
            assert_eq!(texts(doc, "//div[@id='header']"), vec!["Site"]);
            assert_eq!(
                texts(doc, "//div[contains(concat(' ', @class, ' '), ' entry ')]/h2"),
                vec!["Headline"]
            );
            assert_eq!(texts(doc, "//a[@rel='next']/@href"), vec!["/p3"]);
        });
    }

    #[test]
    fn test_positional_predicates() {
        with_doc(|doc| {
            assert_eq!(texts(doc, "//li[2]"), vec!["4"]);
            assert_eq!(texts(doc, "//li[last()]"), vec!["5"]);
            assert_eq!(texts(doc, "//li[position() > 1]"), vec!["4", "5"]);
            assert_eq!(texts(doc, "(//p)[1]"), vec!["First"]);
            assert_eq!(texts(doc, "//p[1]"), vec!["First"]);
        });
    }

    #[test]
    fn test_reverse_axis_positions() {
        with_doc(|doc| {
            assert_eq!(
                texts(doc, "//a[@rel='next']/preceding-sibling::a[1]"),
                vec!["prev"]
            );
            assert_eq!(
                names(doc, "//a[@href='/x']/ancestor::*[1]"),
                vec!["p"]
            );
            assert_eq!(
                names(doc, "//a[@href='/x']/ancestor::div"),
                vec!["div", "div"]
            );
        });
    }

    #[test]
    fn test_following_and_preceding() {
        with_doc(|doc| {
            assert_eq!(texts(doc, "//h2/following::p"), vec!["First", "Second link"]);
            assert_eq!(texts(doc, "//ul/preceding::a[1]"), vec!["next"]);
            assert_eq!(texts(doc, "//div[@id='header']/following-sibling::div[2]/a[2]"), vec!["next"]);
        });
    }

    #[test]
    fn test_union_is_in_document_order() {
        with_doc(|doc| {
            assert_eq!(names(doc, "//ul | //h2 | //h2"), vec!["h2", "ul"]);
        });
    }

    #[test]
    fn test_node_type_tests() {
        with_doc(|doc| {
            assert_eq!(
                texts(doc, "//div[@id='main']/comment()"),
                vec![" trailing comment "]
            );
            assert_eq!(texts(doc, "//h2/text()"), vec!["Headline"]);
            assert_eq!(number(doc, "count(//li/node())"), 3.0);
        });
    }

    #[test]
    fn test_names_are_case_insensitive() {
        with_doc(|doc| {
            assert_eq!(texts(doc, "//DIV[@ID='header']"), vec!["Site"]);
            assert_eq!(texts(doc, "//html:h2"), vec!["Headline"]);
        });
    }

    #[test]
    fn test_string_functions() {
        with_doc(|doc| {
            assert_eq!(string(doc, "string(//h2)"), "Headline");
            assert_eq!(string(doc, "normalize-space(//p[2])"), "Second link");
            assert_eq!(string(doc, "substring-before('2024-01-02', '-')"), "2024");
            assert_eq!(string(doc, "substring-after('2024-01-02', '-')"), "01-02");
            assert_eq!(string(doc, "substring('abcdef', 2, 3)"), "bcd");
            assert_eq!(string(doc, "translate('abc', 'abc', 'ABC')"), "ABC");
            assert_eq!(string(doc, "concat('a', 1, true())"), "a1true");
            assert_eq!(string(doc, "name(//div[@id='main']/@class)"), "class");
            assert_eq!(string(doc, "local-name(//h2)"), "h2");
            assert_eq!(string(doc, "namespace-uri(//h2)"), "");
            assert_eq!(number(doc, "string-length('日本語')"), 3.0);
            assert!(boolean(doc, "starts-with(//h2, 'Head')"));
        });
    }

    #[test]
    fn test_number_functions() {
        with_doc(|doc| {
            assert_eq!(number(doc, "sum(//li)"), 12.0);
            assert_eq!(number(doc, "round(2.5)"), 3.0);
            assert_eq!(number(doc, "round(-2.5)"), -2.0);
            assert_eq!(number(doc, "floor(2.7) + ceiling(2.1)"), 5.0);
            assert_eq!(number(doc, "7 mod 3"), 1.0);
            assert_eq!(number(doc, "7 div 2"), 3.5);
            assert!(number(doc, "number('abc')").is_nan());
            assert_eq!(string(doc, "string(1 div 0)"), "Infinity");
            assert_eq!(string(doc, "string(0 div 0)"), "NaN");
        });
    }

    #[test]
    fn test_comparisons() {
        with_doc(|doc| {
            assert!(boolean(doc, "//li = 4"));
            assert!(boolean(doc, "//li != 4"));
            assert!(!boolean(doc, "//li > 5"));
            assert!(boolean(doc, "//li >= 5"));
            assert!(boolean(doc, "//li = '3'"));
            assert!(boolean(doc, "//h2 = //div[@class='entry-content']/preceding-sibling::h2"));
            assert!(boolean(doc, "//nothing = false()"));
            assert!(!boolean(doc, "//nothing = 'x'"));
            assert!(boolean(doc, "1 < 2 and not(2 < 1) or false()"));
        });
    }

    #[test]
    fn test_id_and_lang() {
        with_doc(|doc| {
            assert_eq!(texts(doc, "id('header')"), vec!["Site"]);
            assert_eq!(names(doc, "id('main header')"), vec!["div", "div"]);
            assert!(boolean(doc, "boolean(//h2[lang('en')])"));
            assert!(!boolean(doc, "boolean(//h2[lang('de')])"));
        });
    }

    #[test]
    fn test_relative_to_context_node() {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        let main = XPath::compile("//div[@id='main']")
            .unwrap()
            .select_first(&doc, doc.root())
            .unwrap()
            .and_then(|n| n.as_node())
            .expect("main div");

        let paragraphs = XPath::compile(".//p").unwrap().select_nodes(&doc, main).unwrap();
        assert_eq!(paragraphs.len(), 2);

        let parent = XPath::compile("..").unwrap().select_nodes(&doc, main).unwrap();
        assert_eq!(parent[0].name(), "body");
    }

    #[test]
    fn test_non_node_set_is_rejected_for_selection() {
        with_doc(|doc| {
            let xpath = XPath::compile("count(//p)").unwrap();
            assert!(matches!(
                xpath.select_nodes(doc, doc.root()),
                Err(XPathError::NotANodeSet)
            ));
            let xpath = XPath::compile("'a' | //p").unwrap();
            assert!(xpath.evaluate(doc, doc.root()).is_err());
        });
    }

    #[test]
    fn test_compile_errors() {
        assert!(XPath::compile("//div[").is_err());
        assert!(XPath::compile("").is_err());
        assert!(XPath::compile("//a[@href=").is_err());
        assert!("//div".parse::<XPath>().is_ok());
        assert_eq!(XPath::compile("//div").unwrap().to_string(), "//div");
    }

    #[test]
    fn test_deep_operator_chains() {
        with_doc(|doc| {
            let chain = |terms: usize| XPath::compile(&vec!["1"; terms].join(" + ")).unwrap();
            assert!(matches!(
                chain(200).evaluate(doc, doc.root()),
                Ok(Value::Number(n)) if n == 200.0
            ));
            assert!(matches!(
                chain(300).evaluate(doc, doc.root()),
                Err(XPathError::TooDeep(_))
            ));
        });
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let deep = format!("{}//div{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(XPath::compile(&deep).is_err());
    }
}
