//! Recursive-descent parser for filter expressions.
//!
//! Precedence, lowest first: `or`, `and`, `not`. Literals are normalized
//! against the attribute they are compared with (units to bytes/seconds,
//! file type names, regex patterns), so the evaluator never looks at units.

use super::ast::{CompareOp, Expr, FunctionCall, Literal, Operand, Pattern};
use super::lexer::{tokenize, Token, TokenKind};
use crate::attributes::{AttributeDescriptor, AttributeTable, FileType, SemanticType, StringMatch};
use crate::extension::{Registry, ValueType};
use crate::flavor::Flavor;
use crate::{Error, Result};

/// Deepest accepted nesting of parentheses, `not` and calls.
const MAX_DEPTH: usize = 128;

/// Inputs to parsing besides the expression itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions<'r> {
    /// Flavor recorded on every `regex`/`iregex` comparison.
    pub flavor: Flavor,
    /// When present, calls are resolved and type-checked while parsing.
    pub registry: Option<&'r Registry>,
}

impl<'r> ParseOptions<'r> {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: &'r Registry) -> Self {
        self.registry = Some(registry);
        self
    }
}

/// Tokenize and parse `input`.
pub fn parse_expression(input: &str, table: &AttributeTable, options: ParseOptions<'_>) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let expr = parse(tokens, table, options)?;
    tracing::debug!(expression = %expr, "parsed filter expression");
    Ok(expr)
}

/// Parse a token sequence.
pub fn parse(tokens: Vec<Token>, table: &AttributeTable, options: ParseOptions<'_>) -> Result<Expr> {
    let end = tokens
        .last()
        .map(|t| t.position + t.lexeme.len())
        .unwrap_or(0);
    let mut parser = Parser {
        tokens,
        pos: 0,
        end,
        depth: 0,
        table,
        options,
    };

    if parser.tokens.is_empty() {
        return Err(Error::syntax(0, "empty expression"));
    }

    let expr = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(Error::syntax(token.position, format!("unexpected {}", token.kind)));
    }
    Ok(expr)
}

/// An operand before it is paired with the other side of a comparison.
#[derive(Debug)]
enum RawOperand {
    Attribute(&'static AttributeDescriptor),
    /// Call plus its return type when the registry is known.
    Call(FunctionCall, Option<ValueType>),
    Number {
        value: i64,
        unit: Option<String>,
    },
    Str(String),
    /// Identifier that is neither an attribute nor a call (`file`, `true`).
    Word(String),
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
    table: &'a AttributeTable,
    options: ParseOptions<'a>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(Error::syntax(
                token.position,
                format!("expected {}, found {}", kind, token.kind),
            )),
            None => Err(Error::syntax(self.end, format!("expected {}, found end of input", kind))),
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::syntax(self.position(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat(&TokenKind::Or) {
            let right = self.and_expr()?;
            left = Expr::or(left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.unary_expr()?;
        while self.eat(&TokenKind::And) {
            let right = self.unary_expr()?;
            left = Expr::and(left, right);
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Not) {
            self.descend()?;
            let inner = self.unary_expr()?;
            self.depth -= 1;
            return Ok(Expr::negate(inner));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::LParen) {
            self.descend()?;
            let inner = self.or_expr()?;
            self.expect(TokenKind::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }

        let position = self.position();
        let left = self.operand()?;

        if let Some(TokenKind::Op(op)) = self.peek_kind() {
            let op = *op;
            self.pos += 1;
            let right_position = self.position();
            let right = self.operand()?;
            return self.comparison(left, op, right, right_position);
        }

        match left {
            RawOperand::Attribute(desc) if desc.ty == SemanticType::Flag => Ok(Expr::Flag(desc.attribute)),
            RawOperand::Attribute(desc) => Err(Error::syntax(
                self.position(),
                format!("expected comparison operator after attribute \"{}\"", desc.name),
            )),
            RawOperand::Call(call, _) => Ok(Expr::Call(call)),
            RawOperand::Word(word) => Err(Error::UnknownAttribute(word)),
            RawOperand::Number { .. } | RawOperand::Str(_) => {
                Err(Error::syntax(position, "literal cannot be used as a condition"))
            }
        }
    }

    fn operand(&mut self) -> Result<RawOperand> {
        let token = match self.next() {
            Some(token) => token,
            None => return Err(Error::syntax(self.end, "unexpected end of input")),
        };

        match token.kind {
            TokenKind::Str(s) => Ok(RawOperand::Str(s)),
            TokenKind::Number { value, unit } => {
                let unit = match unit {
                    Some(unit) => Some(unit),
                    None => self.separated_unit(),
                };
                Ok(RawOperand::Number { value, unit })
            }
            TokenKind::Ident(name) => {
                if self.peek_kind() == Some(&TokenKind::LParen) {
                    return self.call(name);
                }
                match self.table.lookup(&name) {
                    Some(desc) => Ok(RawOperand::Attribute(desc)),
                    None => Ok(RawOperand::Word(name)),
                }
            }
            other => Err(Error::syntax(token.position, format!("unexpected {}", other))),
        }
    }

    /// Absorb a unit word written apart from its number (`5 kilobytes`).
    fn separated_unit(&mut self) -> Option<String> {
        let word = match self.peek_kind() {
            Some(TokenKind::Ident(word)) if self.table.units().is_unit(word) => word.clone(),
            _ => return None,
        };
        if self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::LParen) {
            return None;
        }
        self.pos += 1;
        Some(word)
    }

    fn call(&mut self, name: String) -> Result<RawOperand> {
        let position = self.position();
        self.expect(TokenKind::LParen)?;
        self.descend()?;

        let mut args = Vec::new();
        let mut types = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                let arg_position = self.position();
                let raw = self.operand()?;
                let (arg, ty) = self.call_argument(raw, &name, arg_position)?;
                args.push(arg);
                types.push(ty);

                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen)?;
                break;
            }
        }
        self.depth -= 1;

        let returns = match self.options.registry {
            Some(registry) => {
                let function = registry.lookup(&name)?;
                function.check_args(&types)?;
                Some(function.returns)
            }
            None => None,
        };

        tracing::trace!(function = %name, position, args = args.len(), "parsed call");
        Ok(RawOperand::Call(FunctionCall { name, args }, returns))
    }

    fn call_argument(
        &self,
        raw: RawOperand,
        function: &str,
        position: usize,
    ) -> Result<(Operand, Option<ValueType>)> {
        match raw {
            RawOperand::Number { value, unit: None } => {
                Ok((Operand::Literal(Literal::Integer(value)), Some(ValueType::Integer)))
            }
            RawOperand::Number { unit: Some(unit), .. } => Err(Error::TypeMismatch(format!(
                "argument of \"{}\" at position {} cannot carry unit \"{}\"",
                function, position, unit
            ))),
            RawOperand::Str(s) => Ok((Operand::Literal(Literal::String(s)), Some(ValueType::String))),
            RawOperand::Call(call, ty) => Ok((Operand::Call(call), ty)),
            RawOperand::Attribute(desc) => {
                let ty = match desc.ty {
                    SemanticType::String => ValueType::String,
                    SemanticType::Integer | SemanticType::Size | SemanticType::Time => ValueType::Integer,
                    SemanticType::FileType | SemanticType::Flag => {
                        return Err(Error::TypeMismatch(format!(
                            "{} attribute \"{}\" cannot be passed to \"{}\"",
                            desc.ty, desc.name, function
                        )))
                    }
                };
                Ok((Operand::Attribute(desc.attribute), Some(ty)))
            }
            RawOperand::Word(word) => Err(Error::UnknownAttribute(word)),
        }
    }

    fn comparison(
        &self,
        left: RawOperand,
        op: CompareOp,
        right: RawOperand,
        position: usize,
    ) -> Result<Expr> {
        // keep attributes on the left so literals normalize against them
        let swap = matches!(right, RawOperand::Attribute(_))
            && !matches!(left, RawOperand::Attribute(_));
        let (left, op, right) = if swap {
            (right, op.mirror(), left)
        } else {
            (left, op, right)
        };

        match left {
            RawOperand::Attribute(desc) => self.attribute_comparison(desc, op, right),
            RawOperand::Call(call, returns) => {
                let right = self.call_comparison(&call, returns, op, right)?;
                Ok(Expr::compare(Operand::Call(call), op, right))
            }
            _ => Err(Error::syntax(
                position,
                "comparison needs an attribute or function operand",
            )),
        }
    }

    fn attribute_comparison(
        &self,
        desc: &'static AttributeDescriptor,
        op: CompareOp,
        right: RawOperand,
    ) -> Result<Expr> {
        if op.is_ordering() && !desc.ty.is_numeric() {
            return Err(Error::TypeMismatch(format!(
                "operator \"{}\" is not supported by {} attribute \"{}\"",
                op, desc.ty, desc.name
            )));
        }

        let right = match right {
            RawOperand::Attribute(other) => {
                let compatible = desc.matching != StringMatch::Pattern
                    && (desc.ty == other.ty || (desc.ty.is_numeric() && other.ty.is_numeric()));
                if !compatible {
                    return Err(mismatch(desc, &format!("{} attribute \"{}\"", other.ty, other.name)));
                }
                Operand::Attribute(other.attribute)
            }
            RawOperand::Call(call, returns) => {
                if desc.matching == StringMatch::Pattern {
                    return Err(mismatch(desc, "a function result"));
                }
                if let Some(returns) = returns {
                    if !type_accepts(desc.ty, returns) {
                        return Err(mismatch(desc, &format!("{} function \"{}\"", returns, call.name)));
                    }
                }
                Operand::Call(call)
            }
            RawOperand::Number { value, unit } => {
                let units = self.table.units();
                let literal = match desc.ty {
                    SemanticType::Size => Literal::Size(units.normalize_size(value, unit.as_deref())?),
                    SemanticType::Time => Literal::Time(units.normalize_time(value, unit.as_deref())?),
                    SemanticType::Integer => match unit {
                        None => Literal::Integer(value),
                        Some(unit) => {
                            return Err(Error::UnitParse {
                                unit,
                                dimension: "integer",
                            })
                        }
                    },
                    _ => return Err(mismatch(desc, "a number")),
                };
                Operand::Literal(literal)
            }
            RawOperand::Str(s) => {
                let literal = match (desc.ty, desc.matching) {
                    (SemanticType::String, StringMatch::Pattern) => {
                        Literal::Pattern(Pattern::new(s, self.options.flavor, desc.case_insensitive))
                    }
                    (SemanticType::String, _) => Literal::String(s),
                    (SemanticType::FileType, _) => Literal::FileType(file_type(&s)?),
                    _ => return Err(mismatch(desc, "a string")),
                };
                Operand::Literal(literal)
            }
            RawOperand::Word(word) => {
                let literal = match desc.ty {
                    SemanticType::FileType => Literal::FileType(file_type(&word)?),
                    SemanticType::Flag if word == "true" => Literal::Bool(true),
                    SemanticType::Flag if word == "false" => Literal::Bool(false),
                    _ => return Err(Error::UnknownAttribute(word)),
                };
                Operand::Literal(literal)
            }
        };

        Ok(Expr::compare(Operand::Attribute(desc.attribute), op, right))
    }

    fn call_comparison(
        &self,
        call: &FunctionCall,
        returns: Option<ValueType>,
        op: CompareOp,
        right: RawOperand,
    ) -> Result<Operand> {
        let string_ordering = |ty: Option<ValueType>| op.is_ordering() && ty == Some(ValueType::String);
        let describe = |ty: Option<ValueType>| match ty {
            Some(ty) => format!("{} ", ty),
            None => String::new(),
        };

        match right {
            RawOperand::Call(other, other_returns) => {
                if let (Some(a), Some(b)) = (returns, other_returns) {
                    if a != b {
                        return Err(Error::TypeMismatch(format!(
                            "cannot compare {} function \"{}\" to {} function \"{}\"",
                            a, call.name, b, other.name
                        )));
                    }
                }
                if string_ordering(returns) || string_ordering(other_returns) {
                    return Err(Error::TypeMismatch(format!(
                        "operator \"{}\" is not supported by strings",
                        op
                    )));
                }
                Ok(Operand::Call(other))
            }
            RawOperand::Number { value, unit: None } => {
                if returns == Some(ValueType::String) {
                    return Err(Error::TypeMismatch(format!(
                        "cannot compare string function \"{}\" to a number",
                        call.name
                    )));
                }
                Ok(Operand::Literal(Literal::Integer(value)))
            }
            RawOperand::Number { unit: Some(unit), .. } => Err(Error::UnitParse {
                unit,
                dimension: "integer",
            }),
            RawOperand::Str(s) => {
                if returns == Some(ValueType::Integer) || op.is_ordering() {
                    return Err(Error::TypeMismatch(format!(
                        "cannot compare {}function \"{}\" to a string with \"{}\"",
                        describe(returns),
                        call.name,
                        op
                    )));
                }
                Ok(Operand::Literal(Literal::String(s)))
            }
            RawOperand::Word(word) => Err(Error::UnknownAttribute(word)),
            RawOperand::Attribute(desc) => Err(mismatch(desc, "a function result")),
        }
    }
}

fn type_accepts(ty: SemanticType, value: ValueType) -> bool {
    match value {
        ValueType::String => ty == SemanticType::String,
        ValueType::Integer => ty.is_numeric(),
    }
}

fn file_type(name: &str) -> Result<FileType> {
    FileType::from_name(name)
        .ok_or_else(|| Error::TypeMismatch(format!("\"{}\" is not a file type", name)))
}

fn mismatch(desc: &AttributeDescriptor, what: &str) -> Error {
    Error::TypeMismatch(format!(
        "cannot compare {} attribute \"{}\" to {}",
        desc.ty, desc.name, what
    ))
}
