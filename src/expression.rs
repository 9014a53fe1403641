//! Condition expressions controlling whether a file rule, dependency entry or
//! feature is active.
//!
//! Conditions are parsed once, when the blueprint is loaded, into a small AST:
//!
//! ```text
//! AuthType != "" && (Database == "postgres" || "redis" in Services)
//! not UseDocker
//! Framework in ["gin", "echo"]
//! ```
//!
//! Evaluation is pure. It reads the [`GenerationContext`] and nothing else.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::context::{GenerationContext, Value};
use crate::error::{Error, Result};

/// A literal operand written in the expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Boolean(bool),
    List(Vec<String>),
}

impl Literal {
    fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::List(items) => Value::Choices(items.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Variable(String),
    Literal(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    In,
    NotIn,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        };
        f.write_str(op)
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Bare operand, evaluated for truthiness
    Operand(Operand),
    Compare { op: CompareOp, left: Operand, right: Operand },
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// A parsed condition, keeping its source text for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parses a condition.
    ///
    /// # Errors
    /// * `Error::ExpressionSyntax` if the text is not a well-formed condition
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { source, tokens, pos: 0 };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("unexpected {token}")));
        }
        Ok(Self { source: source.to_string(), root })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Names of every variable the expression references, in order of first use.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_variables(&self.root, &mut names);
        names
    }

    /// Fails with `Error::UndefinedVariable` on the first reference missing from `context`.
    pub fn check_references(&self, context: &GenerationContext) -> Result<()> {
        match self.variables().into_iter().find(|name| !context.contains(name)) {
            Some(name) => Err(Error::UndefinedVariable {
                name: name.to_string(),
                expression: self.source.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Evaluates the condition against the context.
    ///
    /// # Errors
    /// * `Error::UndefinedVariable` if a referenced variable is not in the context
    /// * `Error::TypeMismatch` if a comparison mixes incompatible types
    pub fn evaluate(&self, context: &GenerationContext) -> Result<bool> {
        self.eval_node(&self.root, context)
    }

    fn eval_node(&self, node: &Node, context: &GenerationContext) -> Result<bool> {
        match node {
            Node::Operand(operand) => Ok(self.resolve(operand, context)?.is_truthy()),
            Node::Not(inner) => Ok(!self.eval_node(inner, context)?),
            // Both sides are evaluated so that undefined references always surface.
            Node::And(left, right) => {
                let l = self.eval_node(left, context)?;
                let r = self.eval_node(right, context)?;
                Ok(l && r)
            }
            Node::Or(left, right) => {
                let l = self.eval_node(left, context)?;
                let r = self.eval_node(right, context)?;
                Ok(l || r)
            }
            Node::Compare { op, left, right } => {
                let left = self.resolve(left, context)?;
                let right = self.resolve(right, context)?;
                match op {
                    CompareOp::Eq => self.equals(&left, &right),
                    CompareOp::Ne => self.equals(&left, &right).map(|eq| !eq),
                    CompareOp::In => self.contains(&right, &left),
                    CompareOp::NotIn => self.contains(&right, &left).map(|c| !c),
                }
            }
        }
    }

    fn resolve(&self, operand: &Operand, context: &GenerationContext) -> Result<Value> {
        match operand {
            Operand::Literal(literal) => Ok(literal.to_value()),
            Operand::Variable(name) => {
                context.get(name).cloned().ok_or_else(|| Error::UndefinedVariable {
                    name: name.clone(),
                    expression: self.source.clone(),
                })
            }
        }
    }

    fn equals(&self, left: &Value, right: &Value) -> Result<bool> {
        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
            (Value::Choices(a), Value::Choices(b)) => Ok(a == b),
            _ => match (left.as_str(), right.as_str()) {
                (Some(a), Some(b)) => Ok(a == b),
                _ => Err(self.mismatch(left, right)),
            },
        }
    }

    fn contains(&self, haystack: &Value, needle: &Value) -> Result<bool> {
        // Membership is defined for lists only; a plain string is not a haystack.
        match (haystack, needle.as_str()) {
            (Value::Choices(items), Some(n)) => Ok(items.iter().any(|i| i == n)),
            _ => Err(self.mismatch(needle, haystack)),
        }
    }

    fn mismatch(&self, left: &Value, right: &Value) -> Error {
        Error::TypeMismatch {
            expression: self.source.clone(),
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect_variables<'a>(node: &'a Node, names: &mut Vec<&'a str>) {
    fn push<'a>(operand: &'a Operand, names: &mut Vec<&'a str>) {
        if let Operand::Variable(name) = operand {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }

    match node {
        Node::Operand(operand) => push(operand, names),
        Node::Compare { left, right, .. } => {
            push(left, names);
            push(right, names);
        }
        Node::Not(inner) => collect_variables(inner, names),
        Node::And(left, right) | Node::Or(left, right) => {
            collect_variables(left, names);
            collect_variables(right, names);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    True,
    False,
    And,
    Or,
    Not,
    In,
    EqEq,
    NotEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Str(s) => write!(f, "string \"{s}\""),
            Token::Int(i) => write!(f, "integer {i}"),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Not => f.write_str("'!'"),
            Token::In => f.write_str("'in'"),
            Token::EqEq => f.write_str("'=='"),
            Token::NotEq => f.write_str("'!='"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn syntax_error(source: &str, message: impl Into<String>) -> Error {
    Error::ExpressionSyntax { expression: source.to_string(), message: message.into() }
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '[' | ']' | ',' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    _ => Token::Comma,
                });
            }
            '=' | '!' | '&' | '|' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let token = match (c, next) {
                    ('=', Some('=')) => Token::EqEq,
                    ('!', Some('=')) => Token::NotEq,
                    ('&', Some('&')) => Token::And,
                    ('|', Some('|')) => Token::Or,
                    ('!', _) => {
                        tokens.push(Token::Not);
                        continue;
                    }
                    _ => {
                        return Err(syntax_error(
                            source,
                            format!("unexpected character '{c}' at offset {pos}"),
                        ))
                    }
                };
                chars.next();
                tokens.push(token);
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => value.push(escaped),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err(syntax_error(
                        source,
                        format!("unterminated string starting at offset {pos}"),
                    ));
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&(_, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    text.push(d);
                    chars.next();
                }
                let value = text.parse::<i64>().map_err(|_| {
                    syntax_error(source, format!("invalid integer '{text}' at offset {pos}"))
                })?;
                tokens.push(Token::Int(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !(ch.is_alphanumeric() || ch == '_') {
                        break;
                    }
                    ident.push(ch);
                    chars.next();
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(syntax_error(
                    source,
                    format!("unexpected character '{other}' at offset {pos}"),
                ))
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
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

    fn error(&self, message: impl Into<String>) -> Error {
        syntax_error(self.source, message)
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {expected}, found {token}"))),
            None => Err(self.error(format!("expected {expected}, found end of input"))),
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut node = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            node = Node::Or(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut node = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            node = Node::And(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_not(&mut self) -> Result<Node> {
        if self.eat(&Token::Not) {
            return Ok(Node::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node> {
        if self.eat(&Token::LParen) {
            let node = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(node);
        }

        let left = self.parse_operand()?;
        let op = match (self.peek(), self.peek_at(1)) {
            (Some(Token::EqEq), _) => CompareOp::Eq,
            (Some(Token::NotEq), _) => CompareOp::Ne,
            (Some(Token::In), _) => CompareOp::In,
            (Some(Token::Not), Some(Token::In)) => {
                self.pos += 1;
                CompareOp::NotIn
            }
            _ => return Ok(Node::Operand(left)),
        };
        self.pos += 1;
        let right = self.parse_operand()?;
        Ok(Node::Compare { op, left, right })
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Operand::Variable(name)),
            Some(Token::Str(s)) => Ok(Operand::Literal(Literal::String(s))),
            Some(Token::Int(i)) => Ok(Operand::Literal(Literal::Integer(i))),
            Some(Token::True) => Ok(Operand::Literal(Literal::Boolean(true))),
            Some(Token::False) => Ok(Operand::Literal(Literal::Boolean(false))),
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        match self.advance() {
                            Some(Token::Str(s)) => items.push(s),
                            Some(token) => {
                                return Err(self.error(format!(
                                    "list items must be strings, found {token}"
                                )))
                            }
                            None => return Err(self.error("unterminated list")),
                        }
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Ok(Operand::Literal(Literal::List(items)))
            }
            Some(token) => Err(self.error(format!("expected a value, found {token}"))),
            None => Err(self.error("expected a value, found end of input")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precedence() {
        let expr = Expression::parse(r#"A == "x" || B && !C"#).unwrap();
        match expr.root() {
            Node::Or(left, right) => {
                assert!(matches!(**left, Node::Compare { op: CompareOp::Eq, .. }));
                assert!(matches!(**right, Node::And(_, _)));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_parse_keywords_and_not_in() {
        let expr = Expression::parse(r#"not (Db == 'pg') and "x" not in Tags"#).unwrap();
        match expr.root() {
            Node::And(left, right) => {
                assert!(matches!(**left, Node::Not(_)));
                assert!(matches!(**right, Node::Compare { op: CompareOp::NotIn, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_variables_are_deduplicated() {
        let expr = Expression::parse(r#"A == "1" || (B != "" && A in ["x", "y"])"#).unwrap();
        assert_eq!(expr.variables(), vec!["A", "B"]);
    }

    #[test]
    fn test_syntax_errors() {
        for source in ["", "A ==", "A = 'x'", "(A", "A == 'x", "A in [1]", "A B"] {
            let err = Expression::parse(source).unwrap_err();
            assert!(
                matches!(err, Error::ExpressionSyntax { .. }),
                "expected syntax error for {source:?}, got {err:?}"
            );
        }
    }
}
