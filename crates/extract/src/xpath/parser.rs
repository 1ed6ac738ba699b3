// ABOUTME: Recursive-descent parser turning XPath tokens into an expression tree.
// ABOUTME: Expands the `//`, `.`, `..` and `@` abbreviations and checks function arity.

use super::ast::{Axis, BinaryOp, Expr, Function, NodeTest, NodeType, Path, PathStart, Step};
use super::lexer::Token;
use super::XPathError;

/// Deepest nesting of parenthesized, predicate and argument expressions.
pub(crate) const MAX_NESTING: usize = 64;

/// Longest accepted expression, in tokens. Bounds the depth of operator chains.
pub(crate) const MAX_TOKENS: usize = 4096;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), XPathError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn unexpected(&self, wanted: &str) -> XPathError {
        match self.peek() {
            Some(token) => XPathError::Syntax(format!("expected {} but found {:?}", wanted, token)),
            None => XPathError::Syntax(format!("expected {} but the expression ended", wanted)),
        }
    }

    /// Parses a left-associative chain of binary operators.
    fn binary_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, XPathError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, XPathError> {
        let mut left = operand(self)?;
        while let Some(op) = self.peek().and_then(op_for) {
            self.pos += 1;
            let right = operand(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        if self.depth >= MAX_NESTING {
            return Err(XPathError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let expr =
            self.binary_chain(Self::and_expr, |t| (t == &Token::Or).then_some(BinaryOp::Or));
        self.depth -= 1;
        expr
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_chain(Self::equality_expr, |t| {
            (t == &Token::And).then_some(BinaryOp::And)
        })
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_chain(Self::relational_expr, |t| match t {
            Token::Eq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_chain(Self::additive_expr, |t| match t {
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_chain(Self::multiplicative_expr, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_chain(Self::unary_expr, |t| match t {
            Token::Multiply => Some(BinaryOp::Mul),
            Token::Div => Some(BinaryOp::Div),
            Token::Mod => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    /// `--x` still converts `x` to a number, so runs of minus signs fold to one or two.
    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        let mut minus_signs = 0usize;
        while self.eat(&Token::Minus) {
            minus_signs += 1;
        }
        let operand = self.union_expr()?;
        Ok(match minus_signs {
            0 => operand,
            n if n % 2 == 1 => Expr::Negate(Box::new(operand)),
            _ => Expr::Negate(Box::new(Expr::Negate(Box::new(operand)))),
        })
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_chain(Self::path_expr, |t| {
            (t == &Token::Pipe).then_some(BinaryOp::Union)
        })
    }

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let mut steps = Vec::new();
                if self.peek().is_some_and(starts_step) {
                    self.relative_path(&mut steps)?;
                }
                Ok(Expr::Path(Path {
                    start: PathStart::Root,
                    steps,
                }))
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![Step::descendant_or_self()];
                self.relative_path(&mut steps)?;
                Ok(Expr::Path(Path {
                    start: PathStart::Root,
                    steps,
                }))
            }
            Some(t) if starts_step(t) => {
                let mut steps = Vec::new();
                self.relative_path(&mut steps)?;
                Ok(Expr::Path(Path {
                    start: PathStart::Context,
                    steps,
                }))
            }
            _ => self.filter_path(),
        }
    }

    /// FilterExpr, optionally followed by `/` or `//` and a relative path.
    fn filter_path(&mut self) -> Result<Expr, XPathError> {
        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        let filtered = if predicates.is_empty() {
            primary
        } else {
            Expr::Filter(Box::new(primary), predicates)
        };

        let mut steps = Vec::new();
        if self.eat(&Token::Slash) {
            self.relative_path_after_separator(&mut steps)?;
        } else if self.eat(&Token::DoubleSlash) {
            steps.push(Step::descendant_or_self());
            self.relative_path_after_separator(&mut steps)?;
        } else {
            return Ok(filtered);
        }

        Ok(Expr::Path(Path {
            start: PathStart::Expr(Box::new(filtered)),
            steps,
        }))
    }

    fn relative_path_after_separator(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        if !self.peek().is_some_and(starts_step) {
            return Err(self.unexpected("a location step"));
        }
        self.relative_path(steps)
    }

    fn relative_path(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(());
            }
        }
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Type(NodeType::Node),
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Type(NodeType::Node),
                predicates: Vec::new(),
            });
        }

        let axis = match self.peek() {
            Some(Token::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(Token::Axis(axis)) => {
                let axis = *axis;
                self.pos += 1;
                axis
            }
            _ => Axis::Child,
        };

        let test = match self.advance() {
            Some(Token::NameTest(name)) => NodeTest::Name(name),
            Some(Token::NodeType(node_type)) => {
                self.expect(Token::LParen)?;
                let test = if node_type == NodeType::ProcessingInstruction {
                    match self.peek() {
                        Some(Token::Literal(target)) => {
                            let target = target.clone();
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    }
                } else {
                    NodeTest::Type(node_type)
                };
                self.expect(Token::RParen)?;
                test
            }
            Some(other) => {
                return Err(XPathError::Syntax(format!(
                    "expected a node test but found {:?}",
                    other
                )))
            }
            None => return Err(XPathError::Syntax("expected a node test".to_string())),
        };

        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::FunctionName(name)) => {
                let function =
                    Function::from_name(&name).ok_or_else(|| XPathError::UnknownFunction(name.clone()))?;
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen)?;
                        break;
                    }
                }
                if !function.accepts(args.len()) {
                    return Err(XPathError::Arity {
                        name,
                        given: args.len(),
                    });
                }
                Ok(Expr::Function(function, args))
            }
            Some(other) => Err(XPathError::Syntax(format!(
                "expected an expression but found {:?}",
                other
            ))),
            None => Err(XPathError::Syntax(
                "expected an expression but the expression ended".to_string(),
            )),
        }
    }
}

fn starts_step(token: &Token) -> bool {
    matches!(
        token,
        Token::Dot
            | Token::DotDot
            | Token::At
            | Token::Axis(_)
            | Token::NameTest(_)
            | Token::NodeType(_)
    )
}

pub(crate) fn parse(tokens: Vec<Token>) -> Result<Expr, XPathError> {
    if tokens.len() > MAX_TOKENS {
        return Err(XPathError::Syntax(format!(
            "expression is longer than {} tokens",
            MAX_TOKENS
        )));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.unexpected("the end of the expression"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::super::ast::NameTest;
    use super::super::lexer::tokenize;
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_str(s: &str) -> Result<Expr, XPathError> {
        parse(tokenize(s)?)
    }

    fn child(local: &str) -> Step {
        Step {
            axis: Axis::Child,
            test: NodeTest::Name(NameTest::Name {
                prefix: None,
                local: local.to_string(),
            }),
            predicates: Vec::new(),
        }
    }

    #[test]
    fn test_double_slash_expands() {
        let expr = parse_str("//div/p").unwrap();
        assert_eq!(
            expr,
            Expr::Path(Path {
                start: PathStart::Root,
                steps: vec![Step::descendant_or_self(), child("div"), child("p")],
            })
        );
    }

    #[test]
    fn test_root_only() {
        let expr = parse_str("/").unwrap();
        assert_eq!(
            expr,
            Expr::Path(Path {
                start: PathStart::Root,
                steps: vec![],
            })
        );
    }

    #[test]
    fn test_filter_expression_with_path() {
        let expr = parse_str("(//a)[last()]/@href").unwrap();
        match expr {
            Expr::Path(Path {
                start: PathStart::Expr(inner),
                steps,
            }) => {
                assert!(matches!(*inner, Expr::Filter(_, ref preds) if preds.len() == 1));
                assert_eq!(steps.len(), 1);
                assert_eq!(steps[0].axis, Axis::Attribute);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let expr = parse_str("1 + 2 * 3 = 7 and true()").unwrap();
        match expr {
            Expr::Binary(BinaryOp::And, left, _) => match *left {
                Expr::Binary(BinaryOp::Eq, sum, _) => {
                    assert!(matches!(*sum, Expr::Binary(BinaryOp::Add, _, _)));
                }
                other => panic!("unexpected parse: {other:?}"),
            },
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_unary_minus_binds_tighter_than_union() {
        let expr = parse_str("-1 - -2").unwrap();
        assert!(matches!(expr, Expr::Binary(BinaryOp::Sub, _, _)));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_str("//div["),
            Err(XPathError::Syntax(_))
        ));
        assert!(matches!(
            parse_str("frobnicate(1)"),
            Err(XPathError::UnknownFunction(_))
        ));
        assert!(matches!(
            parse_str("contains('a')"),
            Err(XPathError::Arity { given: 1, .. })
        ));
        assert!(matches!(parse_str("//div/"), Err(XPathError::Syntax(_))));
        assert!(matches!(parse_str("1 +"), Err(XPathError::Syntax(_))));
        assert!(matches!(parse_str("(1))"), Err(XPathError::Syntax(_))));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}//div{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_str(&nested(MAX_NESTING - 1)).is_ok());
        assert_eq!(
            parse_str(&nested(MAX_NESTING)),
            Err(XPathError::TooDeep(MAX_NESTING))
        );
        assert_eq!(
            parse_str(&format!("//a[{}1{}]", "(".repeat(200), ")".repeat(200))),
            Err(XPathError::TooDeep(MAX_NESTING))
        );
    }

    #[test]
    fn test_token_limit() {
        let long = vec!["1"; MAX_TOKENS].join("+");
        assert!(matches!(parse_str(&long), Err(XPathError::Syntax(_))));
    }

    #[test]
    fn test_repeated_minus_folds() {
        let expr = parse_str(&format!("{}1", "-".repeat(10_001))).unwrap();
        assert_eq!(expr, Expr::Negate(Box::new(Expr::Number(1.0))));
        let expr = parse_str("- - 1").unwrap();
        assert_eq!(
            expr,
            Expr::Negate(Box::new(Expr::Negate(Box::new(Expr::Number(1.0)))))
        );
    }
}
