// ABOUTME: Tokenizer for XPath 1.0 expressions.
// ABOUTME: Applies the XPath lexical disambiguation rules for `*`, operator names, node types and axis names.

use super::ast::{Axis, NameTest, NodeType};
use super::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Multiply,
    And,
    Or,
    Mod,
    Div,
    Literal(String),
    Number(f64),
    FunctionName(String),
    NodeType(NodeType),
    /// An axis name together with its trailing `::`.
    Axis(Axis),
    NameTest(NameTest),
}

impl Token {
    fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::And
                | Token::Or
                | Token::Mod
                | Token::Div
                | Token::Multiply
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
        )
    }
}

pub(crate) fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || (!c.is_ascii() && !is_xml_space(c))
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-' || c == '.'
}

/// Whether a `*` or an NCName at this point must be read as an operator.
///
/// Per XPath 1.0 §3.7: if there is a preceding token and it is not one of
/// `@`, `::`, `(`, `[`, `,` or an operator, then it is an operator.
fn operator_expected(tokens: &[Token]) -> bool {
    match tokens.last() {
        None => false,
        Some(t) => !(t.is_operator()
            || matches!(
                t,
                Token::At | Token::Axis(_) | Token::LParen | Token::LBracket | Token::Comma
            )),
    }
}

struct Lexer<'s> {
    chars: Vec<char>,
    pos: usize,
    source: &'s str,
}

impl<'s> Lexer<'s> {
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Index of the next non-space character at or after `from`.
    fn skip_space_from(&self, from: usize) -> usize {
        let mut i = from;
        while self.chars.get(i).is_some_and(|&c| is_xml_space(c)) {
            i += 1;
        }
        i
    }

    fn read_ncname(&mut self) -> String {
        let start = self.pos;
        while self.peek_at(0).is_some_and(is_name_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_number(&mut self) -> Result<f64, XPathError> {
        let start = self.pos;
        while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek_at(0) == Some('.') {
            self.pos += 1;
            while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| XPathError::Syntax(format!("malformed number {:?}", text)))
    }

    fn read_literal(&mut self, quote: char) -> Result<String, XPathError> {
        let start = self.pos;
        self.pos += 1;
        let body_start = self.pos;
        while let Some(c) = self.peek_at(0) {
            if c == quote {
                let literal = self.chars[body_start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(literal);
            }
            self.pos += 1;
        }
        Err(XPathError::UnterminatedLiteral(start))
    }

    /// Reads a name-based token: operator name, axis, function, node type or name test.
    fn read_name_token(&mut self, tokens: &[Token]) -> Result<Token, XPathError> {
        let start = self.pos;
        let name = self.read_ncname();

        if operator_expected(tokens) {
            return match name.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "mod" => Ok(Token::Mod),
                "div" => Ok(Token::Div),
                _ => Err(XPathError::Syntax(format!(
                    "expected an operator at offset {} but found {:?}",
                    start, name
                ))),
            };
        }

        // QName prefix. `::` is handled below as an axis separator.
        if self.peek_at(0) == Some(':') && self.peek_at(1) != Some(':') {
            if self.peek_at(1) == Some('*') {
                self.pos += 2;
                return Ok(Token::NameTest(NameTest::AnyInPrefix(name)));
            }
            if self.peek_at(1).is_some_and(is_name_start) {
                self.pos += 1;
                let local = self.read_ncname();
                let next = self.skip_space_from(self.pos);
                if self.chars.get(next) == Some(&'(') {
                    return Ok(Token::FunctionName(format!("{}:{}", name, local)));
                }
                return Ok(Token::NameTest(NameTest::Name {
                    prefix: Some(name),
                    local,
                }));
            }
            return Err(XPathError::UnexpectedChar {
                position: self.pos,
                found: ':',
            });
        }

        let next = self.skip_space_from(self.pos);
        if self.chars.get(next) == Some(&':') && self.chars.get(next + 1) == Some(&':') {
            self.pos = next + 2;
            return Axis::from_name(&name)
                .map(Token::Axis)
                .ok_or(XPathError::UnknownAxis(name));
        }
        if self.chars.get(next) == Some(&'(') {
            return Ok(match NodeType::from_name(&name) {
                Some(node_type) => Token::NodeType(node_type),
                None => Token::FunctionName(name),
            });
        }

        Ok(Token::NameTest(NameTest::Name {
            prefix: None,
            local: name,
        }))
    }

    fn tokenize(mut self) -> Result<Vec<Token>, XPathError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek_at(0) {
            if is_xml_space(c) {
                self.pos += 1;
                continue;
            }

            let token = match c {
                '/' => {
                    if self.peek_at(1) == Some('/') {
                        self.pos += 2;
                        Token::DoubleSlash
                    } else {
                        self.pos += 1;
                        Token::Slash
                    }
                }
                '.' => {
                    if self.peek_at(1) == Some('.') {
                        self.pos += 2;
                        Token::DotDot
                    } else if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                        Token::Number(self.read_number()?)
                    } else {
                        self.pos += 1;
                        Token::Dot
                    }
                }
                '(' | ')' | '[' | ']' | '@' | ',' | '|' | '+' | '-' | '=' => {
                    self.pos += 1;
                    match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        '[' => Token::LBracket,
                        ']' => Token::RBracket,
                        '@' => Token::At,
                        ',' => Token::Comma,
                        '|' => Token::Pipe,
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        _ => Token::Eq,
                    }
                }
                '!' if self.peek_at(1) == Some('=') => {
                    self.pos += 2;
                    Token::NotEq
                }
                '<' | '>' => {
                    let or_equal = self.peek_at(1) == Some('=');
                    self.pos += if or_equal { 2 } else { 1 };
                    match (c, or_equal) {
                        ('<', true) => Token::Le,
                        ('<', false) => Token::Lt,
                        (_, true) => Token::Ge,
                        (_, false) => Token::Gt,
                    }
                }
                '*' => {
                    self.pos += 1;
                    if operator_expected(&tokens) {
                        Token::Multiply
                    } else {
                        Token::NameTest(NameTest::Any)
                    }
                }
                '"' | '\'' => Token::Literal(self.read_literal(c)?),
                d if d.is_ascii_digit() => Token::Number(self.read_number()?),
                n if is_name_start(n) => self.read_name_token(&tokens)?,
                other => {
                    return Err(XPathError::UnexpectedChar {
                        position: self.pos,
                        found: other,
                    })
                }
            };
            tokens.push(token);
        }

        if tokens.is_empty() {
            return Err(XPathError::Syntax(format!(
                "empty expression {:?}",
                self.source
            )));
        }
        Ok(tokens)
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, XPathError> {
    Lexer {
        chars: source.chars().collect(),
        pos: 0,
        source,
    }
    .tokenize()
}
