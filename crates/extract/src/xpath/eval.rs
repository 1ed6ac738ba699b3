// ABOUTME: Evaluates compiled XPath expressions against a DocumentIndex.
// ABOUTME: Implements the XPath 1.0 data model: node-sets, type conversions, comparisons, axes and core functions.

use std::cell::Cell;
use std::collections::HashSet;

use ego_tree::NodeRef;
use scraper::Node;

use super::ast::{Axis, BinaryOp, Expr, Function, NameTest, NodeTest, NodeType, Path, PathStart, Step};
use super::document::{DocumentIndex, XNode};
use super::lexer::is_xml_space;
use super::XPathError;

/// Result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    /// Nodes in document order, without duplicates.
    NodeSet(Vec<XNode<'a>>),
    Boolean(bool),
    Number(f64),
    String(String),
}

/// Evaluation context: the context node, its position and the context size.
#[derive(Debug, Clone, Copy)]
struct Context<'a> {
    node: XNode<'a>,
    position: usize,
    size: usize,
}

/// A non-node-set operand of a comparison.
#[derive(Debug, Clone, Copy)]
enum Atom<'v> {
    Str(&'v str),
    Num(f64),
    Bool(bool),
}

impl Atom<'_> {
    fn boolean(self) -> bool {
        match self {
            Atom::Str(s) => !s.is_empty(),
            Atom::Num(n) => n != 0.0 && !n.is_nan(),
            Atom::Bool(b) => b,
        }
    }

    fn number(self) -> f64 {
        match self {
            Atom::Str(s) => parse_number(s),
            Atom::Num(n) => n,
            Atom::Bool(b) => bool_to_number(b),
        }
    }
}

fn compare_atoms(op: BinaryOp, left: Atom<'_>, right: Atom<'_>) -> bool {
    match op {
        BinaryOp::Eq | BinaryOp::NotEq => {
            let equal = match (left, right) {
                (Atom::Bool(_), _) | (_, Atom::Bool(_)) => left.boolean() == right.boolean(),
                (Atom::Num(_), _) | (_, Atom::Num(_)) => left.number() == right.number(),
                (Atom::Str(a), Atom::Str(b)) => a == b,
            };
            if op == BinaryOp::Eq {
                equal
            } else {
                !equal
            }
        }
        BinaryOp::Lt => left.number() < right.number(),
        BinaryOp::Le => left.number() <= right.number(),
        BinaryOp::Gt => left.number() > right.number(),
        BinaryOp::Ge => left.number() >= right.number(),
        _ => false,
    }
}

fn bool_to_number(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Converts a string to a number following the XPath `Number` production.
pub(crate) fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(is_xml_space);
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !unsigned.is_empty()
        && unsigned != "."
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.matches('.').count() <= 1;
    if well_formed {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Formats a number the way XPath `string()` does.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

fn normalize_space(s: &str) -> String {
    s.split(is_xml_space)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = round(start);
    let end = length.map_or(f64::INFINITY, |len| first + round(len));
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= first && position < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn translate(s: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// Deepest chain of nested sub-expression evaluations.
pub(crate) const MAX_EVAL_DEPTH: usize = 256;

pub(crate) struct Evaluator<'d, 'a> {
    doc: &'d DocumentIndex<'a>,
    depth: Cell<usize>,
}

impl<'d, 'a> Evaluator<'d, 'a> {
    pub fn new(doc: &'d DocumentIndex<'a>) -> Self {
        Self {
            doc,
            depth: Cell::new(0),
        }
    }

    /// Evaluates `expr` with `node` as the context node (position 1 of 1).
    pub fn evaluate(&self, expr: &Expr, node: XNode<'a>) -> Result<Value<'a>, XPathError> {
        let ctx = Context {
            node,
            position: 1,
            size: 1,
        };
        self.eval(expr, &ctx)
    }

    fn eval(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Value<'a>, XPathError> {
        let depth = self.depth.get();
        if depth >= MAX_EVAL_DEPTH {
            return Err(XPathError::TooDeep(MAX_EVAL_DEPTH));
        }
        self.depth.set(depth + 1);
        let value = self.eval_expr(expr, ctx);
        self.depth.set(depth);
        value
    }

    fn eval_expr(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Value<'a>, XPathError> {
        match expr {
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Negate(inner) => {
                let value = self.eval(inner, ctx)?;
                Ok(Value::Number(-self.number(&value)))
            }
            Expr::Binary(op, left, right) => self.binary(*op, left, right, ctx),
            Expr::Function(function, args) => self.call(*function, args, ctx),
            Expr::Filter(primary, predicates) => {
                let mut nodes = self.node_set(primary, ctx)?;
                for predicate in predicates {
                    nodes = self.apply_predicate(nodes, predicate)?;
                }
                Ok(Value::NodeSet(nodes))
            }
            Expr::Path(path) => self.path(path, ctx).map(Value::NodeSet),
        }
    }

    fn node_set(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Vec<XNode<'a>>, XPathError> {
        match self.eval(expr, ctx)? {
            Value::NodeSet(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet),
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: &Context<'a>,
    ) -> Result<Value<'a>, XPathError> {
        match op {
            BinaryOp::Or => {
                let l = self.eval(left, ctx)?;
                if self.boolean(&l) {
                    return Ok(Value::Boolean(true));
                }
                let r = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.boolean(&r)))
            }
            BinaryOp::And => {
                let l = self.eval(left, ctx)?;
                if !self.boolean(&l) {
                    return Ok(Value::Boolean(false));
                }
                let r = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.boolean(&r)))
            }
            BinaryOp::Union => {
                let mut nodes = self.node_set(left, ctx)?;
                nodes.extend(self.node_set(right, ctx)?);
                self.doc.sort_and_dedup(&mut nodes);
                Ok(Value::NodeSet(nodes))
            }
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.compare(op, &l, &r)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let a = self.eval(left, ctx)?;
                let b = self.eval(right, ctx)?;
                let (a, b) = (self.number(&a), self.number(&b));
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                };
                Ok(Value::Number(result))
            }
        }
    }

    fn compare(&self, op: BinaryOp, left: &Value<'a>, right: &Value<'a>) -> bool {
        match (left, right) {
            (Value::NodeSet(l), Value::NodeSet(r)) => {
                let right_values: Vec<String> =
                    r.iter().map(|n| self.doc.string_value(n)).collect();
                l.iter().any(|a| {
                    let a = self.doc.string_value(a);
                    right_values
                        .iter()
                        .any(|b| compare_atoms(op, Atom::Str(&a), Atom::Str(b)))
                })
            }
            (Value::NodeSet(set), other) => self.compare_with_set(op, set, other, false),
            (other, Value::NodeSet(set)) => self.compare_with_set(op, set, other, true),
            (l, r) => compare_atoms(op, atom(l), atom(r)),
        }
    }

    /// Compares a node-set against a non-node-set value.
    ///
    /// `set_on_right` keeps the operand order for relational operators.
    fn compare_with_set(
        &self,
        op: BinaryOp,
        set: &[XNode<'a>],
        other: &Value<'a>,
        set_on_right: bool,
    ) -> bool {
        let ordered = |a: Atom<'_>, b: Atom<'_>| {
            if set_on_right {
                compare_atoms(op, b, a)
            } else {
                compare_atoms(op, a, b)
            }
        };

        if let Value::Boolean(b) = other {
            return ordered(Atom::Bool(!set.is_empty()), Atom::Bool(*b));
        }
        let other = atom(other);
        set.iter().any(|node| {
            let value = self.doc.string_value(node);
            ordered(Atom::Str(&value), other)
        })
    }

    fn path(&self, path: &Path, ctx: &Context<'a>) -> Result<Vec<XNode<'a>>, XPathError> {
        let mut nodes = match &path.start {
            PathStart::Root => vec![XNode::Node(self.doc.root())],
            PathStart::Context => vec![ctx.node],
            PathStart::Expr(expr) => self.node_set(expr, ctx)?,
        };
        for step in &path.steps {
            nodes = self.step(step, &nodes)?;
        }
        Ok(nodes)
    }

    fn step(&self, step: &Step, input: &[XNode<'a>]) -> Result<Vec<XNode<'a>>, XPathError> {
        let mut out = Vec::new();
        for node in input {
            let mut selected: Vec<XNode<'a>> = self
                .axis(step.axis, *node)
                .into_iter()
                .filter(|candidate| self.node_test(&step.test, step.axis, candidate))
                .collect();
            for predicate in &step.predicates {
                selected = self.apply_predicate(selected, predicate)?;
            }
            out.extend(selected);
        }
        self.doc.sort_and_dedup(&mut out);
        Ok(out)
    }

    /// Filters nodes (given in axis order) by a predicate.
    fn apply_predicate(
        &self,
        nodes: Vec<XNode<'a>>,
        predicate: &Expr,
    ) -> Result<Vec<XNode<'a>>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (i, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Number(n) => n == (i + 1) as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes on `axis` from `node`, in axis order (reverse document order for reverse axes).
    fn axis(&self, axis: Axis, node: XNode<'a>) -> Vec<XNode<'a>> {
        let wrap = |n: NodeRef<'a, Node>| XNode::Node(n);
        match node {
            XNode::Node(n) => match axis {
                Axis::Child => n.children().map(wrap).collect(),
                Axis::Descendant => n.descendants().skip(1).map(wrap).collect(),
                Axis::DescendantOrSelf => n.descendants().map(wrap).collect(),
                Axis::Parent => n.parent().map(wrap).into_iter().collect(),
                Axis::Ancestor => n.ancestors().map(wrap).collect(),
                Axis::AncestorOrSelf => std::iter::once(n).chain(n.ancestors()).map(wrap).collect(),
                Axis::FollowingSibling => n.next_siblings().map(wrap).collect(),
                Axis::PrecedingSibling => n.prev_siblings().map(wrap).collect(),
                Axis::Following => self.following(n),
                Axis::Preceding => self.preceding(n),
                Axis::Attribute => attributes(n),
                Axis::Namespace => Vec::new(),
                Axis::SelfAxis => vec![node],
            },
            XNode::Attribute { owner, .. } => match axis {
                Axis::SelfAxis => vec![node],
                Axis::Parent => vec![wrap(owner)],
                Axis::Ancestor => std::iter::once(owner)
                    .chain(owner.ancestors())
                    .map(wrap)
                    .collect(),
                Axis::AncestorOrSelf => std::iter::once(node)
                    .chain(std::iter::once(owner).chain(owner.ancestors()).map(wrap))
                    .collect(),
                Axis::Following => {
                    let mut nodes: Vec<XNode<'a>> =
                        owner.descendants().skip(1).map(wrap).collect();
                    nodes.extend(self.following(owner));
                    nodes
                }
                Axis::Preceding => self.preceding(owner),
                _ => Vec::new(),
            },
        }
    }

    fn following(&self, node: NodeRef<'a, Node>) -> Vec<XNode<'a>> {
        std::iter::once(node)
            .chain(node.ancestors())
            .flat_map(|n| n.next_siblings())
            .flat_map(|sibling| sibling.descendants())
            .map(XNode::Node)
            .collect()
    }

    fn preceding(&self, node: NodeRef<'a, Node>) -> Vec<XNode<'a>> {
        let ancestors: HashSet<_> = node.ancestors().map(|a| a.id()).collect();
        let mut nodes: Vec<XNode<'a>> = self
            .doc
            .root()
            .descendants()
            .take_while(|n| n.id() != node.id())
            .filter(|n| !ancestors.contains(&n.id()))
            .map(XNode::Node)
            .collect();
        nodes.reverse();
        nodes
    }

    fn node_test(&self, test: &NodeTest, axis: Axis, node: &XNode<'a>) -> bool {
        match test {
            NodeTest::Name(name_test) => match node {
                XNode::Attribute { name, .. } if axis == Axis::Attribute => {
                    name_matches(name_test, name)
                }
                XNode::Node(n) if axis != Axis::Attribute => n
                    .value()
                    .as_element()
                    .is_some_and(|el| name_matches(name_test, el.name())),
                _ => false,
            },
            NodeTest::Type(NodeType::Node) => true,
            NodeTest::Type(NodeType::Text) => node.as_node().is_some_and(|n| n.value().is_text()),
            NodeTest::Type(NodeType::Comment) => {
                node.as_node().is_some_and(|n| n.value().is_comment())
            }
            NodeTest::Type(NodeType::ProcessingInstruction) => {
                self.node_test(&NodeTest::ProcessingInstruction(None), axis, node)
            }
            NodeTest::ProcessingInstruction(target) => node.as_node().is_some_and(|n| {
                match n.value() {
                    Node::ProcessingInstruction(pi) => {
                        target.as_deref().map_or(true, |t| &*pi.target == t)
                    }
                    _ => false,
                }
            }),
        }
    }

    fn call(
        &self,
        function: Function,
        args: &[Expr],
        ctx: &Context<'a>,
    ) -> Result<Value<'a>, XPathError> {
        let value = match function {
            Function::Last => Value::Number(ctx.size as f64),
            Function::Position => Value::Number(ctx.position as f64),
            Function::Count => Value::Number(self.node_set(&args[0], ctx)?.len() as f64),
            Function::Id => Value::NodeSet(self.id(&args[0], ctx)?),
            Function::LocalName | Function::Name => {
                let node = self.optional_node(args, ctx)?;
                Value::String(node.map_or(String::new(), |n| n.name().to_string()))
            }
            Function::NamespaceUri => {
                // Evaluated for its errors; namespaces are not modelled.
                self.optional_node(args, ctx)?;
                Value::String(String::new())
            }
            Function::String => Value::String(self.optional_string(args, ctx)?),
            Function::Concat => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.string_arg(arg, ctx)?);
                }
                Value::String(out)
            }
            Function::StartsWith => {
                let (s, prefix) = (self.string_arg(&args[0], ctx)?, self.string_arg(&args[1], ctx)?);
                Value::Boolean(s.starts_with(&prefix))
            }
            Function::Contains => {
                let (s, needle) = (self.string_arg(&args[0], ctx)?, self.string_arg(&args[1], ctx)?);
                Value::Boolean(s.contains(&needle))
            }
            Function::SubstringBefore => {
                let (s, sep) = (self.string_arg(&args[0], ctx)?, self.string_arg(&args[1], ctx)?);
                Value::String(
                    s.find(&sep)
                        .map_or(String::new(), |i| s[..i].to_string()),
                )
            }
            Function::SubstringAfter => {
                let (s, sep) = (self.string_arg(&args[0], ctx)?, self.string_arg(&args[1], ctx)?);
                Value::String(
                    s.find(&sep)
                        .map_or(String::new(), |i| s[i + sep.len()..].to_string()),
                )
            }
            Function::Substring => {
                let s = self.string_arg(&args[0], ctx)?;
                let start = self.number_arg(&args[1], ctx)?;
                let length = match args.get(2) {
                    Some(arg) => Some(self.number_arg(arg, ctx)?),
                    None => None,
                };
                Value::String(substring(&s, start, length))
            }
            Function::StringLength => {
                let s = self.optional_string(args, ctx)?;
                Value::Number(s.chars().count() as f64)
            }
            Function::NormalizeSpace => {
                let s = self.optional_string(args, ctx)?;
                Value::String(normalize_space(&s))
            }
            Function::Translate => {
                let s = self.string_arg(&args[0], ctx)?;
                let from = self.string_arg(&args[1], ctx)?;
                let to = self.string_arg(&args[2], ctx)?;
                Value::String(translate(&s, &from, &to))
            }
            Function::Boolean => {
                let v = self.eval(&args[0], ctx)?;
                Value::Boolean(self.boolean(&v))
            }
            Function::Not => {
                let v = self.eval(&args[0], ctx)?;
                Value::Boolean(!self.boolean(&v))
            }
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Lang => {
                let wanted = self.string_arg(&args[0], ctx)?;
                Value::Boolean(self.lang_matches(ctx.node, &wanted))
            }
            Function::Number => {
                let n = match args.first() {
                    Some(arg) => self.number_arg(arg, ctx)?,
                    None => parse_number(&self.doc.string_value(&ctx.node)),
                };
                Value::Number(n)
            }
            Function::Sum => {
                let nodes = self.node_set(&args[0], ctx)?;
                Value::Number(
                    nodes
                        .iter()
                        .map(|n| parse_number(&self.doc.string_value(n)))
                        .sum(),
                )
            }
            Function::Floor => Value::Number(self.number_arg(&args[0], ctx)?.floor()),
            Function::Ceiling => Value::Number(self.number_arg(&args[0], ctx)?.ceil()),
            Function::Round => Value::Number(round(self.number_arg(&args[0], ctx)?)),
        };
        Ok(value)
    }

    fn string_arg(&self, arg: &Expr, ctx: &Context<'a>) -> Result<String, XPathError> {
        let v = self.eval(arg, ctx)?;
        Ok(self.string(&v))
    }

    fn number_arg(&self, arg: &Expr, ctx: &Context<'a>) -> Result<f64, XPathError> {
        let v = self.eval(arg, ctx)?;
        Ok(self.number(&v))
    }

    /// String of the single optional argument, or of the context node.
    fn optional_string(&self, args: &[Expr], ctx: &Context<'a>) -> Result<String, XPathError> {
        match args.first() {
            Some(arg) => self.string_arg(arg, ctx),
            None => Ok(self.doc.string_value(&ctx.node)),
        }
    }

    /// First node of the single optional node-set argument, or the context node.
    fn optional_node(
        &self,
        args: &[Expr],
        ctx: &Context<'a>,
    ) -> Result<Option<XNode<'a>>, XPathError> {
        match args.first() {
            Some(arg) => Ok(self.node_set(arg, ctx)?.into_iter().next()),
            None => Ok(Some(ctx.node)),
        }
    }

    fn id(&self, arg: &Expr, ctx: &Context<'a>) -> Result<Vec<XNode<'a>>, XPathError> {
        let wanted: HashSet<String> = match self.eval(arg, ctx)? {
            Value::NodeSet(nodes) => nodes
                .iter()
                .flat_map(|n| {
                    self.doc
                        .string_value(n)
                        .split(is_xml_space)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect(),
            other => self
                .string(&other)
                .split(is_xml_space)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        };
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        Ok(self
            .doc
            .root()
            .descendants()
            .filter(|n| {
                n.value()
                    .as_element()
                    .and_then(|el| el.attr("id"))
                    .is_some_and(|id| wanted.contains(id) && seen.insert(id.to_string()))
            })
            .map(XNode::Node)
            .collect())
    }

    fn lang_matches(&self, node: XNode<'a>, wanted: &str) -> bool {
        let start = match node {
            XNode::Node(n) => n,
            XNode::Attribute { owner, .. } => owner,
        };
        let declared = std::iter::once(start)
            .chain(start.ancestors())
            .find_map(|n| n.value().as_element().and_then(|el| el.attr("lang")));
        match declared {
            Some(lang) => {
                let lang = lang.to_ascii_lowercase();
                let wanted = wanted.to_ascii_lowercase();
                lang == wanted
                    || lang
                        .strip_prefix(&wanted)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            None => false,
        }
    }

    pub fn boolean(&self, value: &Value<'a>) -> bool {
        match value {
            Value::NodeSet(nodes) => !nodes.is_empty(),
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    pub fn number(&self, value: &Value<'a>) -> f64 {
        match value {
            Value::NodeSet(_) => parse_number(&self.string(value)),
            Value::Boolean(b) => bool_to_number(*b),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
        }
    }

    pub fn string(&self, value: &Value<'a>) -> String {
        match value {
            Value::NodeSet(nodes) => nodes
                .first()
                .map_or(String::new(), |n| self.doc.string_value(n)),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
        }
    }
}

fn atom<'v>(value: &'v Value<'_>) -> Atom<'v> {
    match value {
        Value::String(s) => Atom::Str(s),
        Value::Number(n) => Atom::Num(*n),
        Value::Boolean(b) => Atom::Bool(*b),
        Value::NodeSet(nodes) => Atom::Bool(!nodes.is_empty()),
    }
}

fn attributes<'a>(node: NodeRef<'a, Node>) -> Vec<XNode<'a>> {
    match node.value().as_element() {
        Some(el) => el
            .attrs()
            .enumerate()
            .map(|(index, (name, value))| XNode::Attribute {
                owner: node,
                index,
                name,
                value,
            })
            .collect(),
        None => Vec::new(),
    }
}

fn name_matches(test: &NameTest, name: &str) -> bool {
    match test {
        NameTest::Any | NameTest::AnyInPrefix(_) => true,
        NameTest::Name { local, .. } => local.eq_ignore_ascii_case(name),
    }
}
