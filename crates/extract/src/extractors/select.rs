// ABOUTME: XPath-based selection of article content and next-page links from a parsed page.
// ABOUTME: Content is the outer HTML of matched elements; next links are resolved against the page URL.

use ego_tree::NodeRef;
use scraper::Node;
use url::Url;

use crate::xpath::{DocumentIndex, XPath, XPathError};

/// Serializes the element nodes selected by `xpath`, concatenated in document order.
///
/// Non-element nodes (text, attributes, comments) are ignored. An empty
/// string means the expression selected nothing usable.
pub fn extract_content_html<'a>(
    doc: &DocumentIndex<'a>,
    context: NodeRef<'a, Node>,
    xpath: &XPath,
) -> Result<String, XPathError> {
    let nodes = xpath.select_nodes(doc, context)?;
    Ok(nodes
        .iter()
        .filter_map(|node| node.as_element())
        .map(|el| el.html())
        .collect())
}

/// Finds the next-page URL selected by `xpath`.
///
/// Only the first selected node is considered. It must be an element with
/// a non-empty `href`, which is resolved against `base` when one is given.
pub fn extract_next_link<'a>(
    doc: &DocumentIndex<'a>,
    context: NodeRef<'a, Node>,
    xpath: &XPath,
    base: Option<&Url>,
) -> Result<Option<String>, XPathError> {
    let Some(first) = xpath.select_first(doc, context)? else {
        return Ok(None);
    };
    let href = match first.attr("href").map(str::trim) {
        Some(href) if !href.is_empty() => href,
        _ => return Ok(None),
    };

    let resolved = match base {
        Some(base) => match base.join(href) {
            Ok(url) => url.to_string(),
            Err(err) => {
                tracing::debug!(href, error = %err, "next link does not resolve to a URL");
                return Ok(None);
            }
        },
        None => match Url::parse(href) {
            Ok(url) => url.to_string(),
            Err(_) => href.to_string(),
        },
    };
    Ok(Some(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    const PAGE: &str = r#"<html><body>
        <div class="post"><p>One</p></div>
        <div class="post"><p>Two</p></div>
        <div class="pager">
          <span class="next">no link here</span>
          <a class="next" href="/next?p=2">Next</a>
          <a class="blank" href="  ">Blank</a>
        </div>
    </body></html>"#;

    fn xpath(s: &str) -> XPath {
        XPath::compile(s).unwrap()
    }

    #[test]
    fn test_content_concatenates_outer_html_in_document_order() {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        let body = doc.body().unwrap();

        let content = extract_content_html(&doc, body, &xpath("//div[@class='post']")).unwrap();
        assert_eq!(
            content,
            r#"<div class="post"><p>One</p></div><div class="post"><p>Two</p></div>"#
        );
    }

    #[test]
    fn test_content_ignores_non_element_nodes() {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        let body = doc.body().unwrap();

        let content = extract_content_html(&doc, body, &xpath("//p/text()")).unwrap();
        assert_eq!(content, "");
        let content = extract_content_html(&doc, body, &xpath("//div/@class")).unwrap();
        assert_eq!(content, "");
    }

    #[test]
    fn test_content_rejects_non_node_set() {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        let body = doc.body().unwrap();

        let err = extract_content_html(&doc, body, &xpath("count(//p)")).unwrap_err();
        assert_eq!(err, XPathError::NotANodeSet);
    }

    #[test]
    fn test_next_link_resolves_against_base() {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        let body = doc.body().unwrap();
        let base = Url::parse("https://example.com/article").unwrap();

        let next = extract_next_link(&doc, body, &xpath("//a[@class='next']"), Some(&base)).unwrap();
        assert_eq!(next.as_deref(), Some("https://example.com/next?p=2"));
    }

    #[test]
    fn test_next_link_uses_only_the_first_node() {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        let body = doc.body().unwrap();
        let base = Url::parse("https://example.com/article").unwrap();

        // The first match is a <span> without href.
        let next = extract_next_link(&doc, body, &xpath("//*[@class='next']"), Some(&base)).unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn test_next_link_requires_non_empty_href() {
        let html = Html::parse_document(PAGE);
        let doc = DocumentIndex::new(&html);
        let body = doc.body().unwrap();

        let next = extract_next_link(&doc, body, &xpath("//a[@class='blank']"), None).unwrap();
        assert_eq!(next, None);
        let next = extract_next_link(&doc, body, &xpath("//a[@class='missing']"), None).unwrap();
        assert_eq!(next, None);
    }
}
