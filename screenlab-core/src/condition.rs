//! Boolean condition language used by flag predicates and component
//! adjustments.
//!
//! Grammar (parsed once, when a model is built):
//!
//! ```text
//! expr     := and_expr ("or" and_expr)*
//! and_expr := atom ("and" atom)*
//! atom     := "(" expr ")"
//!           | "atleast" "(" INT ("," expr)+ ")"
//!           | operand (CMP operand)+          chained comparison
//! operand  := NUMBER | METRIC | NUMBER "*" METRIC
//! CMP      := "<" | "<=" | ">" | ">=" | "=="
//! ```
//!
//! There is no negation. Any comparison that touches a missing metric is
//! false, so every condition is missing-safe.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::ConfigError;
use crate::metric::MetricRow;

// ─── AST ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl CmpOp {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => lhs == rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    /// `factor * metric`; a bare metric has factor 1.
    Metric { name: String, factor: f64 },
}

impl Operand {
    fn value(&self, row: &MetricRow) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Metric { name, factor } => row.get(name).map(|v| v * factor),
        }
    }
}

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    AtLeast { n: usize, of: Vec<Condition> },
}

impl Condition {
    /// Parse condition text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCondition {
            source_text: text.to_string(),
            reason,
        };
        let tokens = tokenize(text).map_err(invalid)?;
        let mut parser = Parser { tokens, pos: 0 };
        let cond = parser.expr().map_err(invalid)?;
        match parser.peek() {
            None => Ok(cond),
            Some(tok) => Err(invalid(format!("unexpected trailing {tok}"))),
        }
    }

    /// Evaluate against a row. Missing metrics make comparisons false.
    pub fn evaluate(&self, row: &MetricRow) -> bool {
        match self {
            Self::Compare { lhs, op, rhs } => match (lhs.value(row), rhs.value(row)) {
                (Some(l), Some(r)) => op.apply(l, r),
                _ => false,
            },
            Self::All(parts) => parts.iter().all(|c| c.evaluate(row)),
            Self::Any(parts) => parts.iter().any(|c| c.evaluate(row)),
            Self::AtLeast { n, of } => of.iter().filter(|c| c.evaluate(row)).count() >= *n,
        }
    }

    /// Every metric name the condition reads.
    pub fn metrics(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_metrics(&mut out);
        out
    }

    fn collect_metrics(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Compare { lhs, rhs, .. } => {
                for side in [lhs, rhs] {
                    if let Operand::Metric { name, .. } = side {
                        out.insert(name.clone());
                    }
                }
            }
            Self::All(parts) | Self::Any(parts) | Self::AtLeast { of: parts, .. } => {
                for p in parts {
                    p.collect_metrics(out);
                }
            }
        }
    }
}

// ─── Lexer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Cmp(CmpOp),
    Star,
    LParen,
    RParen,
    Comma,
    And,
    Or,
    AtLeast,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Ident(s) => write!(f, "'{s}'"),
            Token::Cmp(op) => write!(f, "'{}'", op.symbol()),
            Token::Star => f.write_str("'*'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::AtLeast => f.write_str("'atleast'"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '<' | '>' | '=' => {
                let next_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, next_eq) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    ('>', true) => CmpOp::Ge,
                    ('>', false) => CmpOp::Gt,
                    ('=', true) => CmpOp::Eq,
                    _ => return Err("single '=' is not an operator, use '=='".into()),
                };
                tokens.push(Token::Cmp(op));
                i += if next_eq { 2 } else { 1 };
            }
            c if c.is_ascii_digit() || c == '.' || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("bad number '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "atleast" => Token::AtLeast,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    if tokens.is_empty() {
        return Err("empty condition".into());
    }
    Ok(tokens)
}

// ─── Parser ─────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: Token) -> Result<(), String> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(format!("expected {want}, found {tok}")),
            None => Err(format!("expected {want}, found end of input")),
        }
    }

    fn expr(&mut self) -> Result<Condition, String> {
        let mut parts = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            parts.push(self.and_expr()?);
        }
        Ok(collapse(parts, Condition::Any))
    }

    fn and_expr(&mut self) -> Result<Condition, String> {
        let mut parts = vec![self.atom()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            parts.push(self.atom()?);
        }
        Ok(collapse(parts, Condition::All))
    }

    fn atom(&mut self) -> Result<Condition, String> {
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::AtLeast) => {
                self.pos += 1;
                self.at_least()
            }
            _ => self.chain(),
        }
    }

    fn at_least(&mut self) -> Result<Condition, String> {
        self.expect(Token::LParen)?;
        let n = match self.next() {
            Some(Token::Number(v)) if v >= 0.0 && v.fract() == 0.0 => v as usize,
            Some(tok) => return Err(format!("atleast needs a whole count, found {tok}")),
            None => return Err("atleast needs a count".into()),
        };
        let mut of = Vec::new();
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            of.push(self.expr()?);
        }
        self.expect(Token::RParen)?;
        if of.is_empty() {
            return Err("atleast needs at least one condition".into());
        }
        if n > of.len() {
            return Err(format!("atleast({n}) over only {} conditions", of.len()));
        }
        Ok(Condition::AtLeast { n, of })
    }

    fn chain(&mut self) -> Result<Condition, String> {
        let mut lhs = self.operand()?;
        let mut links = Vec::new();
        while let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.operand()?;
            links.push(Condition::Compare {
                lhs,
                op,
                rhs: rhs.clone(),
            });
            lhs = rhs;
        }
        if links.is_empty() {
            return Err("expected a comparison operator".into());
        }
        Ok(collapse(links, Condition::All))
    }

    fn operand(&mut self) -> Result<Operand, String> {
        match self.next() {
            Some(Token::Number(n)) => {
                if self.peek() == Some(&Token::Star) {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => Ok(Operand::Metric { name, factor: n }),
                        Some(tok) => Err(format!("expected metric after '*', found {tok}")),
                        None => Err("expected metric after '*'".into()),
                    }
                } else {
                    Ok(Operand::Number(n))
                }
            }
            Some(Token::Ident(name)) => Ok(Operand::Metric { name, factor: 1.0 }),
            Some(tok) => Err(format!("expected a number or metric, found {tok}")),
            None => Err("unexpected end of input".into()),
        }
    }
}

fn collapse(mut parts: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        wrap(parts)
    }
}
