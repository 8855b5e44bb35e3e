//! Expression evaluation against a [`FileContext`].
//!
//! Evaluation is a pure walk of the tree: the same expression, context and
//! `now` always give the same verdict. `and`/`or` short-circuit, but any call
//! that is reached must resolve and type-check; there is no "error means no
//! match" fallback.

use std::borrow::Cow;

use chrono::Utc;

use crate::attributes::{Attribute, AttributeTable, FileType, StringMatch, TimeSpan};
use crate::context::FileContext;
use crate::extension::{Registry, Value};
use crate::query::{CompareOp, Comparison, Expr, FunctionCall, Literal, Operand, Pattern};
use crate::{Error, Result};

/// Evaluates expressions with a fixed reference time.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'r> {
    registry: Option<&'r Registry>,
    table: AttributeTable,
    now: i64,
}

/// An operand reduced to a comparable value.
#[derive(Debug)]
enum Resolved<'a> {
    Text(Cow<'a, str>),
    Number(i64),
    Span(TimeSpan),
    Kind(FileType),
    Bool(bool),
    Pattern(&'a Pattern),
}

impl Resolved<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Resolved::Text(_) => "string",
            Resolved::Number(_) => "integer",
            Resolved::Span(_) => "time",
            Resolved::Kind(_) => "file type",
            Resolved::Bool(_) => "flag",
            Resolved::Pattern(_) => "pattern",
        }
    }
}

impl<'r> Evaluator<'r> {
    /// Create an evaluator whose reference time is the current time.
    pub fn new(registry: Option<&'r Registry>) -> Self {
        Self {
            registry,
            table: AttributeTable::builtin(),
            now: Utc::now().timestamp(),
        }
    }

    /// Use `now` (Unix seconds) as the reference time for ages.
    pub fn with_now(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// Evaluate `expr` for one file.
    pub fn evaluate(&self, expr: &Expr, ctx: &FileContext) -> Result<bool> {
        match expr {
            Expr::And(terms) => {
                for term in terms {
                    if !self.evaluate(term, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or(terms) => {
                for term in terms {
                    if self.evaluate(term, ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Not(inner) => Ok(!self.evaluate(inner, ctx)?),
            Expr::Flag(attribute) => ctx.flag(*attribute).ok_or_else(|| {
                Error::TypeMismatch(format!("attribute \"{}\" is not a flag", attribute))
            }),
            Expr::Call(call) => Ok(match self.call(call, ctx)? {
                Value::Integer(i) => i != 0,
                Value::String(s) => !s.is_empty(),
            }),
            Expr::Comparison(comparison) => self.compare(comparison, ctx),
        }
    }

    fn compare(&self, comparison: &Comparison, ctx: &FileContext) -> Result<bool> {
        let Comparison { left, op, right } = comparison;

        let (matching, case_insensitive) = match left {
            Operand::Attribute(attribute) => self
                .table
                .descriptor(*attribute)
                .map(|d| (d.matching, d.case_insensitive))
                .unwrap_or((StringMatch::Exact, false)),
            _ => (StringMatch::Exact, false),
        };

        let left = self.resolve(left, ctx)?;
        let right = self.resolve(right, ctx)?;
        let op = *op;

        match (left, right) {
            (Resolved::Number(age), Resolved::Span(span)) => {
                Ok(match op {
                    CompareOp::Eq => in_bucket(age, span),
                    CompareOp::NotEq => !in_bucket(age, span),
                    // `<=` is `<` or `=`, so it takes in the whole bucket
                    CompareOp::Lte => age < span.seconds.saturating_add(span.granularity),
                    _ => op.apply(age, span.seconds),
                })
            }
            (Resolved::Number(a), Resolved::Number(b)) => Ok(op.apply(a, b)),
            (Resolved::Text(text), Resolved::Pattern(pattern)) => {
                let matched = pattern.regex()?.is_match(&text);
                equality(op, matched)
            }
            (Resolved::Text(a), Resolved::Text(b)) => {
                let matched = match matching {
                    StringMatch::Glob if case_insensitive => {
                        glob_match::glob_match(&b.to_lowercase(), &a.to_lowercase())
                    }
                    StringMatch::Glob => glob_match::glob_match(&b, &a),
                    _ => a == b,
                };
                equality(op, matched)
            }
            (Resolved::Kind(a), Resolved::Kind(b)) => equality(op, a == b),
            (Resolved::Bool(a), Resolved::Bool(b)) => equality(op, a == b),
            (left, right) => Err(Error::TypeMismatch(format!(
                "cannot compare {} to {}",
                left.describe(),
                right.describe()
            ))),
        }
    }

    fn resolve<'a>(&self, operand: &'a Operand, ctx: &'a FileContext) -> Result<Resolved<'a>> {
        Ok(match operand {
            Operand::Attribute(attribute) => self.attribute(*attribute, ctx),
            Operand::Literal(literal) => match literal {
                Literal::String(s) => Resolved::Text(Cow::Borrowed(s)),
                Literal::Integer(i) | Literal::Size(i) => Resolved::Number(*i),
                Literal::Time(span) => Resolved::Span(*span),
                Literal::FileType(ft) => Resolved::Kind(*ft),
                Literal::Bool(b) => Resolved::Bool(*b),
                Literal::Pattern(p) => Resolved::Pattern(p),
            },
            Operand::Call(call) => match self.call(call, ctx)? {
                Value::String(s) => Resolved::Text(Cow::Owned(s)),
                Value::Integer(i) => Resolved::Number(i),
            },
        })
    }

    fn attribute<'a>(&self, attribute: Attribute, ctx: &'a FileContext) -> Resolved<'a> {
        match attribute {
            Attribute::Name | Attribute::IName => Resolved::Text(Cow::Borrowed(&ctx.name)),
            Attribute::Regex | Attribute::IRegex => Resolved::Text(ctx.path.to_string_lossy()),
            Attribute::Size => Resolved::Number(ctx.size),
            Attribute::Atime => Resolved::Number(self.age(ctx.atime)),
            Attribute::Mtime => Resolved::Number(self.age(ctx.mtime)),
            Attribute::Ctime => Resolved::Number(self.age(ctx.ctime)),
            Attribute::Type => Resolved::Kind(ctx.file_type),
            Attribute::User => Resolved::Text(Cow::Borrowed(&ctx.user)),
            Attribute::Uid => Resolved::Number(i64::from(ctx.uid)),
            Attribute::Group => Resolved::Text(Cow::Borrowed(&ctx.group)),
            Attribute::Gid => Resolved::Number(i64::from(ctx.gid)),
            Attribute::Filesystem => Resolved::Text(Cow::Borrowed(&ctx.filesystem)),
            Attribute::Readable => Resolved::Bool(ctx.readable),
            Attribute::Writable => Resolved::Bool(ctx.writable),
            Attribute::Executable => Resolved::Bool(ctx.executable),
            Attribute::Empty => Resolved::Bool(ctx.empty),
        }
    }

    fn age(&self, timestamp: i64) -> i64 {
        self.now.saturating_sub(timestamp)
    }

    fn call(&self, call: &FunctionCall, ctx: &FileContext) -> Result<Value> {
        let registry = self
            .registry
            .ok_or_else(|| Error::UnknownFunction(call.name.clone()))?;
        let function = registry.lookup(&call.name)?;

        let args = call
            .args
            .iter()
            .map(|arg| self.argument(arg, &call.name, ctx))
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(function = %call.name, path = %ctx.path.display(), "invoking extension");
        registry.invoke(function, &args, &ctx.path)
    }

    fn argument(&self, operand: &Operand, function: &str, ctx: &FileContext) -> Result<Value> {
        match self.resolve(operand, ctx)? {
            Resolved::Text(s) => Ok(Value::String(s.into_owned())),
            Resolved::Number(i) => Ok(Value::Integer(i)),
            Resolved::Span(span) => Ok(Value::Integer(span.seconds)),
            other => Err(Error::TypeMismatch(format!(
                "{} value cannot be passed to \"{}\"",
                other.describe(),
                function
            ))),
        }
    }
}

/// `[s, s + g)`: `mtime=6days` holds for ages from 6 days up to 7 days.
fn in_bucket(age: i64, span: TimeSpan) -> bool {
    age >= span.seconds && age < span.seconds.saturating_add(span.granularity)
}

fn equality(op: CompareOp, matched: bool) -> Result<bool> {
    match op {
        CompareOp::Eq => Ok(matched),
        CompareOp::NotEq => Ok(!matched),
        _ => Err(Error::TypeMismatch(format!(
            "operator \"{}\" needs numeric operands",
            op
        ))),
    }
}
