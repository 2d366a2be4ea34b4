//! A small arithmetic/comparison expression language.
//!
//! Expressions are tokenized, parsed into an [`Expr`] tree by recursive
//! descent, and interpreted by a tree walker. The only inputs an expression
//! can reach are the field values handed to [`Expr::evaluate`]; there are no
//! function calls.
//!
//! ```text
//! expr       := additive (cmp_op additive)?
//! additive   := term (('+' | '-') term)*
//! term       := unary (('*' | '/') unary)*
//! unary      := '-' unary | primary
//! primary    := number | string | true | false | null | field | '(' expr ')'
//! field      := '{' name '}' | identifier
//! ```

use std::{fmt, iter::Peekable, str::CharIndices};

use thiserror::Error;

use crate::data::Value;

/// Upper bound on the height of a parsed tree. Counts parentheses, unary
/// minus, and every operator in a chain.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Literal(Value),
    Op(BinaryOp),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Field(name) => write!(f, "field '{name}'"),
            Token::Literal(value) => write!(f, "literal '{value}'"),
            Token::Op(op) => write!(f, "operator '{op}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Value),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.comparison()?;
        match parser.next() {
            None => Ok(expr),
            Some(token) => Err(ExprError::UnexpectedToken {
                found: token.to_string(),
                expected: "end of expression",
            }),
        }
    }

    /// Evaluates the tree, resolving field references through `lookup`.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<Value, ExprError>
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Expr::Field(name) => lookup(name).ok_or_else(|| ExprError::UnknownField(name.clone())),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Negate(inner) => {
                let value = inner.evaluate(lookup)?;
                value.as_number().map(|n| Value::Number(-n)).ok_or(
                    ExprError::TypeMismatch {
                        op: BinaryOp::Sub,
                        left: "number",
                        right: value.type_name(),
                    },
                )
            }
            Expr::Binary { op, left, right } => {
                let left = left.evaluate(lookup)?;
                let right = right.evaluate(lookup)?;
                apply_binary(*op, &left, &right)
            }
        }
    }

    /// Names of every field the expression references, in source order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Field(name) => out.push(name),
            Expr::Literal(_) => {}
            Expr::Negate(inner) => inner.collect_fields(out),
            Expr::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
        }
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if op.is_comparison() {
        return Ok(Value::Boolean(compare(op, left, right)));
    }
    let mismatch = || ExprError::TypeMismatch {
        op,
        left: left.type_name(),
        right: right.type_name(),
    };
    let numbers = left.as_number().zip(right.as_number());
    match op {
        BinaryOp::Add => match numbers {
            Some((l, r)) => Ok(Value::Number(l + r)),
            None if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
                Ok(Value::String(format!("{left}{right}")))
            }
            None => Err(mismatch()),
        },
        BinaryOp::Sub => numbers.map(|(l, r)| Value::Number(l - r)).ok_or_else(mismatch),
        BinaryOp::Mul => numbers.map(|(l, r)| Value::Number(l * r)).ok_or_else(mismatch),
        BinaryOp::Div => {
            let (l, r) = numbers.ok_or_else(mismatch)?;
            if r == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Number(l / r))
        }
        _ => unreachable!("comparison operators handled above"),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) | (_, Value::Null) => {
            return matches!(op, BinaryOp::Ne);
        }
        (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
        _ => match left.as_number().zip(right.as_number()) {
            Some((l, r)) => l.total_cmp(&r),
            None => left.as_display().cmp(&right.as_display()),
        },
    };
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '+' | '-' | '*' | '/' => {
                chars.next();
                tokens.push(Token::Op(match ch {
                    '+' => BinaryOp::Add,
                    '-' => BinaryOp::Sub,
                    '*' => BinaryOp::Mul,
                    _ => BinaryOp::Div,
                }));
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = chars.next_if(|(_, next)| *next == '=').is_some();
                let op = match (ch, followed_by_eq) {
                    ('=', true) => BinaryOp::Eq,
                    ('!', true) => BinaryOp::Ne,
                    ('<', false) => BinaryOp::Lt,
                    ('<', true) => BinaryOp::Le,
                    ('>', false) => BinaryOp::Gt,
                    ('>', true) => BinaryOp::Ge,
                    _ => return Err(ExprError::UnexpectedChar { ch, offset }),
                };
                tokens.push(Token::Op(op));
            }
            '{' => {
                chars.next();
                let name = take_until(&mut chars, '}')
                    .ok_or(ExprError::Unterminated {
                        what: "field reference",
                        offset,
                    })?;
                tokens.push(Token::Field(name.trim().to_string()));
            }
            '\'' | '"' => {
                chars.next();
                let text = take_until(&mut chars, ch).ok_or(ExprError::Unterminated {
                    what: "string literal",
                    offset,
                })?;
                tokens.push(Token::Literal(Value::String(text)));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut raw = String::new();
                while let Some((_, next)) = chars.next_if(|(_, n)| n.is_ascii_digit() || *n == '.') {
                    raw.push(next);
                }
                let number = raw
                    .parse::<f64>()
                    .map_err(|_| ExprError::UnexpectedChar { ch: '.', offset })?;
                tokens.push(Token::Literal(Value::Number(number)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some((_, next)) =
                    chars.next_if(|(_, n)| n.is_alphanumeric() || *n == '_')
                {
                    ident.push(next);
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::Literal(Value::Boolean(true)),
                    "false" => Token::Literal(Value::Boolean(false)),
                    "null" => Token::Literal(Value::Null),
                    _ => Token::Field(ident),
                });
            }
            other => return Err(ExprError::UnexpectedChar { ch: other, offset }),
        }
    }
    Ok(tokens)
}

fn take_until(chars: &mut Peekable<CharIndices<'_>>, terminator: char) -> Option<String> {
    let mut text = String::new();
    for (_, ch) in chars.by_ref() {
        if ch == terminator {
            return Some(text);
        }
        text.push(ch);
    }
    None
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn next_op_if(&mut self, accept: impl Fn(BinaryOp) -> bool) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token::Op(op)) if accept(*op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let start = self.depth;
        let mut expr = self.additive()?;
        if let Some(op) = self.next_op_if(|op| op.is_comparison()) {
            self.descend()?;
            let right = self.additive()?;
            expr = binary(op, expr, right);
        }
        self.depth = start;
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let start = self.depth;
        let mut expr = self.term()?;
        while let Some(op) = self.next_op_if(|op| matches!(op, BinaryOp::Add | BinaryOp::Sub)) {
            self.descend()?;
            let right = self.term()?;
            expr = binary(op, expr, right);
        }
        self.depth = start;
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let start = self.depth;
        let mut expr = self.unary()?;
        while let Some(op) = self.next_op_if(|op| matches!(op, BinaryOp::Mul | BinaryOp::Div)) {
            self.descend()?;
            let right = self.unary()?;
            expr = binary(op, expr, right);
        }
        self.depth = start;
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.next_op_if(|op| op == BinaryOp::Sub).is_some() {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        const EXPECTED: &str = "a value, field, or '('";
        match self.next() {
            Some(Token::Field(name)) => Ok(Expr::Field(name)),
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.comparison()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ExprError::UnexpectedToken {
                        found: other.to_string(),
                        expected: "')'",
                    }),
                    None => Err(ExprError::UnexpectedEnd { expected: "')'" }),
                }
            }
            Some(other) => Err(ExprError::UnexpectedToken {
                found: other.to_string(),
                expected: EXPECTED,
            }),
            None => Err(ExprError::UnexpectedEnd { expected: EXPECTED }),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
