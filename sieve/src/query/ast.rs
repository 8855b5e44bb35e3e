//! Expression tree produced by the parser.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::attributes::{Attribute, FileType, TimeSpan};
use crate::flavor::Flavor;
use crate::Result;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=` or `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

impl CompareOp {
    /// True for `<`, `<=`, `>`, `>=`.
    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::NotEq)
    }

    /// The operator with its operands swapped (`a < b` == `b > a`).
    pub fn mirror(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            op => op,
        }
    }

    /// Apply the operator to two ordered values.
    pub fn apply<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            CompareOp::Eq => a == b,
            CompareOp::NotEq => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Lte => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Gte => a >= b,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::NotEq => write!(f, "!="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
        }
    }
}

/// A boolean expression.
///
/// `and`/`or` chains are kept flat so a long chain never nests deeper than
/// its parentheses do.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Comparison(Comparison),
    /// Bare flag attribute (`readable`).
    Flag(Attribute),
    /// Bare function call, true when the result is non-zero / non-empty.
    Call(FunctionCall),
}

impl Expr {
    pub fn and(left: Expr, right: Expr) -> Self {
        let mut terms = match left {
            Expr::And(terms) => terms,
            other => vec![other],
        };
        match right {
            Expr::And(rest) => terms.extend(rest),
            other => terms.push(other),
        }
        Expr::And(terms)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        let mut terms = match left {
            Expr::Or(terms) => terms,
            other => vec![other],
        };
        match right {
            Expr::Or(rest) => terms.extend(rest),
            other => terms.push(other),
        }
        Expr::Or(terms)
    }

    pub fn negate(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    /// Build a comparison node.
    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        Expr::Comparison(Comparison { left, op, right })
    }
}

/// `left op right`. The parser only builds comparisons whose operand types
/// support `op`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

/// Comparison operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Attribute(Attribute),
    Call(FunctionCall),
    Literal(Literal),
}

/// Extension function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Operand>,
}

/// Literal values, already normalized to canonical form.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    /// Size in bytes.
    Size(i64),
    /// Age in seconds plus the unit it was written in.
    Time(TimeSpan),
    FileType(FileType),
    Bool(bool),
    /// Pattern of a `regex`/`iregex` comparison.
    Pattern(Pattern),
}

/// A regex pattern with the flavor selected for the expression. Compiled on
/// first use and cached; the cache is shared by concurrent evaluations.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub flavor: Flavor,
    pub case_insensitive: bool,
    compiled: OnceLock<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>, flavor: Flavor, case_insensitive: bool) -> Self {
        Self {
            source: source.into(),
            flavor,
            case_insensitive,
            compiled: OnceLock::new(),
        }
    }

    /// The compiled regex.
    pub fn regex(&self) -> Result<&Regex> {
        if let Some(re) = self.compiled.get() {
            return Ok(re);
        }
        let re = self.flavor.compile(&self.source, self.case_insensitive)?;
        // a concurrent evaluation may have won the race; either value is equal
        Ok(self.compiled.get_or_init(|| re))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.flavor == other.flavor
            && self.case_insensitive == other.case_insensitive
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(terms) => write_chain(f, terms, " and "),
            Expr::Or(terms) => write_chain(f, terms, " or "),
            Expr::Not(e) => write!(f, "not {}", e),
            Expr::Comparison(c) => write!(f, "{} {} {}", c.left, c.op, c.right),
            Expr::Flag(attr) => write!(f, "{}", attr),
            Expr::Call(call) => write!(f, "{}", call),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Attribute(attr) => write!(f, "{}", attr),
            Operand::Call(call) => write!(f, "{}", call),
            Operand::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write_quoted(f, s),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Size(bytes) => write!(f, "{}b", bytes),
            Literal::Time(span) => {
                let unit = match span.granularity {
                    60 => "minutes",
                    3_600 => "hours",
                    _ => "days",
                };
                write!(f, "{}{}", span.seconds / span.granularity.max(1), unit)
            }
            Literal::FileType(ft) => write!(f, "{}", ft),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Pattern(p) => write_quoted(f, &p.source),
        }
    }
}

fn write_chain(f: &mut fmt::Formatter<'_>, terms: &[Expr], joiner: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(joiner)?;
        }
        write!(f, "{}", term)?;
    }
    f.write_str(")")
}

/// Quote `s` so the lexer reads it back unchanged. A backslash is doubled
/// only where the lexer would otherwise collapse it.
fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' if matches!(chars.peek(), None | Some('"') | Some('\\')) => f.write_str("\\\\")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}
