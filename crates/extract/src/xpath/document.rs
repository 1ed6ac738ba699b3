// ABOUTME: Adapts a parsed scraper document to the XPath data model.
// ABOUTME: Defines XNode (tree node or attribute) and DocumentIndex, which knows document order.

use std::collections::HashMap;

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node};

/// A node as seen by XPath: a tree node or one attribute of an element.
#[derive(Debug, Clone, Copy)]
pub enum XNode<'a> {
    Node(NodeRef<'a, Node>),
    Attribute {
        owner: NodeRef<'a, Node>,
        /// Position among the owner's attributes, used for document order.
        index: usize,
        name: &'a str,
        value: &'a str,
    },
}

impl<'a> XNode<'a> {
    /// The underlying tree node, if this is not an attribute.
    pub fn as_node(&self) -> Option<NodeRef<'a, Node>> {
        match self {
            XNode::Node(node) => Some(*node),
            XNode::Attribute { .. } => None,
        }
    }

    /// The element this node is, if it is one.
    pub fn as_element(&self) -> Option<ElementRef<'a>> {
        self.as_node().and_then(ElementRef::wrap)
    }

    /// Value of an attribute of this element node.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.as_element().and_then(|el| el.value().attr(name))
    }

    /// Element or attribute name; empty for other node kinds.
    pub fn name(&self) -> &'a str {
        match self {
            XNode::Node(node) => node.value().as_element().map_or("", |el| el.name()),
            XNode::Attribute { name, .. } => name,
        }
    }
}

/// A parsed document together with the document order of its nodes.
pub struct DocumentIndex<'a> {
    root: NodeRef<'a, Node>,
    order: HashMap<NodeId, usize>,
}

impl<'a> DocumentIndex<'a> {
    pub fn new(html: &'a Html) -> Self {
        let root = html.tree.root();
        let order = root
            .descendants()
            .enumerate()
            .map(|(i, node)| (node.id(), i))
            .collect();
        Self { root, order }
    }

    /// The document node.
    pub fn root(&self) -> NodeRef<'a, Node> {
        self.root
    }

    /// The first `<body>` element in document order.
    pub fn body(&self) -> Option<NodeRef<'a, Node>> {
        self.root.descendants().find(|node| {
            node.value()
                .as_element()
                .is_some_and(|el| el.name().eq_ignore_ascii_case("body"))
        })
    }

    /// Sort key realizing document order. Attributes sort after their owner
    /// and before its children.
    pub(crate) fn order_key(&self, node: &XNode<'a>) -> (usize, usize) {
        match node {
            XNode::Node(n) => (self.position(n), 0),
            XNode::Attribute { owner, index, .. } => (self.position(owner), index + 1),
        }
    }

    fn position(&self, node: &NodeRef<'a, Node>) -> usize {
        self.order.get(&node.id()).copied().unwrap_or(usize::MAX)
    }

    /// Sorts nodes into document order and removes duplicates.
    pub(crate) fn sort_and_dedup(&self, nodes: &mut Vec<XNode<'a>>) {
        nodes.sort_by_key(|n| self.order_key(n));
        nodes.dedup_by_key(|n| self.order_key(n));
    }

    /// The XPath string-value of a node.
    pub fn string_value(&self, node: &XNode<'a>) -> String {
        match node {
            XNode::Attribute { value, .. } => (*value).to_string(),
            XNode::Node(n) => match n.value() {
                Node::Text(text) => text.to_string(),
                Node::Comment(comment) => comment.to_string(),
                Node::ProcessingInstruction(pi) => pi.data.to_string(),
                Node::Doctype(_) => String::new(),
                Node::Document | Node::Fragment | Node::Element(_) => n
                    .descendants()
                    .filter_map(|d| d.value().as_text().map(|t| &**t))
                    .collect(),
            },
        }
    }
}
