//! Condition expressions for `decision` nodes and conditional edges.
//!
//! A deliberately small language evaluated against a single root binding,
//! `input`:
//!
//! ```text
//! expr    := or
//! or      := and ( "||" and )*
//! and     := cmp ( "&&" cmp )*
//! cmp     := unary ( ( "==" | "===" | "!=" | "!==" | "<" | "<=" | ">" | ">=" ) unary )?
//! unary   := "!" unary | "-" unary | primary
//! primary := number | string | "true" | "false" | "null" | "undefined"
//!          | path | "(" expr ")"
//! path    := "input" ( "." ident | "[" ( string | number ) "]" )*
//! ```
//!
//! `.length` on a string or array yields its length. Missing fields
//! evaluate to `null`; evaluation never fails once parsing succeeded.

use std::fmt;

use serde_json::{Number, Value};
use thiserror::Error;

const ROOT: &str = "input";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed expression at offset {offset}: {message}")]
pub struct ExprError {
    pub offset: usize,
    pub message: String,
}

impl ExprError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Not,
    Minus,
    And,
    Or,
    Cmp(CmpOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let next2 = chars.get(i + 2).map(|&(_, c)| c);

        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push((pos, Token::Dot));
                i += 1;
            }
            '[' => {
                tokens.push((pos, Token::LBracket));
                i += 1;
            }
            ']' => {
                tokens.push((pos, Token::RBracket));
                i += 1;
            }
            '(' => {
                tokens.push((pos, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                i += 1;
            }
            '-' => {
                tokens.push((pos, Token::Minus));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push((pos, Token::And));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push((pos, Token::Or));
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push((pos, Token::Cmp(CmpOp::Eq)));
                i += if next2 == Some('=') { 3 } else { 2 };
            }
            '!' if next == Some('=') => {
                tokens.push((pos, Token::Cmp(CmpOp::Ne)));
                i += if next2 == Some('=') { 3 } else { 2 };
            }
            '!' => {
                tokens.push((pos, Token::Not));
                i += 1;
            }
            '<' | '>' => {
                let inclusive = next == Some('=');
                let op = match (c, inclusive) {
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                tokens.push((pos, Token::Cmp(op)));
                i += if inclusive { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    let Some(&(_, ch)) = chars.get(j) else {
                        return Err(ExprError::new(pos, "unterminated string literal"));
                    };
                    match ch {
                        '\\' => {
                            let Some(&(_, escaped)) = chars.get(j + 1) else {
                                return Err(ExprError::new(pos, "unterminated string literal"));
                            };
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            j += 2;
                        }
                        ch if ch == quote => break,
                        ch => {
                            text.push(ch);
                            j += 1;
                        }
                    }
                }
                tokens.push((pos, Token::Str(text)));
                i = j + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|&(_, ch)| ch.is_ascii_digit() || ch == '.')
                {
                    j += 1;
                }
                let end = chars.get(j).map_or(src.len(), |&(p, _)| p);
                let literal = &src[pos..end];
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::new(pos, format!("invalid number '{literal}'")))?;
                tokens.push((pos, Token::Number(number)));
                i = j;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|&(_, ch)| ch.is_alphanumeric() || ch == '_' || ch == '$')
                {
                    j += 1;
                }
                let end = chars.get(j).map_or(src.len(), |&(p, _)| p);
                tokens.push((pos, Token::Ident(src[pos..end].to_string())));
                i = j;
            }
            other => {
                return Err(ExprError::new(pos, format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Accessor {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Path(Vec<Accessor>),
    Not(Box<Node>),
    Neg(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare(CmpOp, Box<Node>, Box<Node>),
}

/// Deepest allowed nesting of `!`, `-` and parentheses.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |&(p, _)| p)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ExprError>) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::new(
                self.offset(),
                format!("expression nested deeper than {MAX_DEPTH} levels"),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExprError> {
        let offset = self.offset();
        match self.advance() {
            Some(ref t) if *t == expected => Ok(()),
            _ => Err(ExprError::new(offset, format!("expected {what}"))),
        }
    }

    fn or(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let rhs = self.and()?;
            lhs = Node::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let rhs = self.comparison()?;
            lhs = Node::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Node, ExprError> {
        let lhs = self.unary()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.advance();
            let rhs = self.unary()?;
            return Ok(Node::Compare(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, ExprError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                Ok(Node::Not(Box::new(self.nested(Self::unary)?)))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Node::Neg(Box::new(self.nested(Self::unary)?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Node, ExprError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Node::Literal(number(n))),
            Some(Token::Str(s)) => Ok(Node::Literal(Value::String(s))),
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Node::Literal(Value::Bool(true))),
                "false" => Ok(Node::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Node::Literal(Value::Null)),
                ROOT => self.path(),
                other => Err(ExprError::new(
                    offset,
                    format!("unknown identifier '{other}' (only `{ROOT}` is in scope)"),
                )),
            },
            Some(_) => Err(ExprError::new(offset, "unexpected token")),
            None => Err(ExprError::new(offset, "unexpected end of expression")),
        }
    }

    fn path(&mut self) -> Result<Node, ExprError> {
        let mut accessors = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let offset = self.offset();
                    match self.advance() {
                        Some(Token::Ident(field)) => accessors.push(Accessor::Field(field)),
                        _ => return Err(ExprError::new(offset, "expected field name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let offset = self.offset();
                    let accessor = match self.advance() {
                        Some(Token::Str(field)) => Accessor::Field(field),
                        Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                            Accessor::Index(n as usize)
                        }
                        _ => return Err(ExprError::new(offset, "expected string or index")),
                    };
                    accessors.push(accessor);
                    self.expect(Token::RBracket, "']'")?;
                }
                _ => return Ok(Node::Path(accessors)),
            }
        }
    }
}

fn number(n: f64) -> Value {
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let root = parser.or()?;
        if parser.peek().is_some() {
            return Err(ExprError::new(parser.offset(), "unexpected trailing tokens"));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to a JSON value with `input` bound to `input`.
    pub fn evaluate(&self, input: &Value) -> Value {
        eval(&self.root, input)
    }

    /// Evaluate and coerce with truthiness rules (`null`, `false`, `0`,
    /// `""` are false; everything else, including empty containers, true).
    pub fn is_true(&self, input: &Value) -> bool {
        truthy(&self.evaluate(input))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn eval(node: &Node, input: &Value) -> Value {
    match node {
        Node::Literal(v) => v.clone(),
        Node::Path(accessors) => resolve(input, accessors),
        Node::Not(inner) => Value::Bool(!truthy(&eval(inner, input))),
        Node::Neg(inner) => match eval(inner, input).as_f64() {
            Some(n) => number(-n),
            None => Value::Null,
        },
        Node::And(lhs, rhs) => {
            let l = eval(lhs, input);
            if truthy(&l) { eval(rhs, input) } else { l }
        }
        Node::Or(lhs, rhs) => {
            let l = eval(lhs, input);
            if truthy(&l) { l } else { eval(rhs, input) }
        }
        Node::Compare(op, lhs, rhs) => Value::Bool(compare(*op, &eval(lhs, input), &eval(rhs, input))),
    }
}

fn resolve(input: &Value, accessors: &[Accessor]) -> Value {
    let mut current = input.clone();
    for accessor in accessors {
        current = match (accessor, &current) {
            (Accessor::Field(f), Value::String(s)) if f == "length" => {
                Value::from(s.chars().count())
            }
            (Accessor::Field(f), Value::Array(items)) if f == "length" => Value::from(items.len()),
            (Accessor::Field(f), Value::Object(map)) => map.get(f).cloned().unwrap_or(Value::Null),
            (Accessor::Index(i), Value::Array(items)) => items.get(*i).cloned().unwrap_or(Value::Null),
            (Accessor::Field(f), Value::Array(items)) => f
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    current
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => equals(lhs, rhs),
        CmpOp::Ne => !equals(lhs, rhs),
        _ => {
            let ordering = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return false;
            };
            match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Ge => ordering.is_ge(),
                CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
            }
        }
    }
}

fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(src: &str, input: Value) -> bool {
        Expression::parse(src).expect("should parse").is_true(&input)
    }

    #[test]
    fn numeric_comparisons() {
        assert!(check("input.score > 0.5", json!({ "score": 0.9 })));
        assert!(!check("input.score > 0.5", json!({ "score": 0.2 })));
        assert!(check("input.score >= 1", json!({ "score": 1.0 })));
        assert!(check("input.delta < -1", json!({ "delta": -3 })));
    }

    #[test]
    fn equality_and_strings() {
        assert!(check("input.seniority === 'senior'", json!({ "seniority": "senior" })));
        assert!(check("input.seniority != \"junior\"", json!({ "seniority": "senior" })));
        assert!(check("input.count == 2", json!({ "count": 2.0 })));
    }

    #[test]
    fn boolean_operators_and_grouping() {
        let input = json!({ "a": true, "b": false, "n": 3 });
        assert!(check("input.a && !input.b", input.clone()));
        assert!(check("input.b || (input.n > 2 && input.a)", input.clone()));
        assert!(!check("!(input.n > 2)", input));
    }

    #[test]
    fn paths_lengths_and_missing_fields() {
        let input = json!({ "experiences": [{ "title": "CTO" }], "name": "Ada", "tags": [] });
        assert!(check("input.experiences.length > 0", input.clone()));
        assert!(check("input['experiences'][0].title == 'CTO'", input.clone()));
        assert!(check("input.name.length == 3", input.clone()));
        assert!(check("input.tags", input.clone()), "empty arrays are truthy");
        assert!(!check("input.missing.deeper", input.clone()));
        assert!(check("input.missing == null", input));
    }

    #[test]
    fn bare_input_is_truthy_for_objects() {
        assert!(check("input", json!({})));
        assert!(!check("input", Value::Null));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for src in [
            "",
            "input.score >",
            "input.score > 0.5 )",
            "window.alert(1)",
            "input.",
            "'unterminated",
            "input.a = 1",
            "input[foo]",
        ] {
            assert!(Expression::parse(src).is_err(), "`{src}` should not parse");
        }
    }

    #[test]
    fn nesting_depth_is_capped() {
        assert!(check(&format!("{}input.a", "!".repeat(10)), json!({ "a": true })));
        assert!(Expression::parse(&format!("{}input.a", "!".repeat(5000))).is_err());

        let deep = format!("{}input.a{}", "(".repeat(5000), ")".repeat(5000));
        let err = Expression::parse(&deep).unwrap_err();
        assert!(err.to_string().contains("nested deeper than 64"));
    }

    #[test]
    fn display_round_trips_source() {
        let expr = Expression::parse("input.x > 1").unwrap();
        assert_eq!(expr.to_string(), "input.x > 1");
    }
}
