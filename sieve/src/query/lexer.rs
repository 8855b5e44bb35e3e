//! Tokenizer for filter expressions.

use std::fmt;

use super::ast::CompareOp;
use crate::{Error, Result};

/// Token kinds produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    /// Integer literal, with the unit word glued to it (`1kb`, `6days`).
    Number { value: i64, unit: Option<String> },
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Comma,
}

/// A token with its source text and byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: usize,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier \"{}\"", name),
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            TokenKind::Number { value, unit: Some(unit) } => write!(f, "number {}{}", value, unit),
            TokenKind::Number { value, unit: None } => write!(f, "number {}", value),
            TokenKind::Op(op) => write!(f, "operator \"{}\"", op),
            TokenKind::And => f.write_str("\"and\""),
            TokenKind::Or => f.write_str("\"or\""),
            TokenKind::Not => f.write_str("\"not\""),
            TokenKind::LParen => f.write_str("\"(\""),
            TokenKind::RParen => f.write_str("\")\""),
            TokenKind::Comma => f.write_str("\",\""),
        }
    }
}

/// Split `input` into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let lexeme = self.input[start..self.offset()].to_string();
        self.tokens.push(Token {
            kind,
            lexeme,
            position: start,
        });
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            let start = self.offset();

            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            match c {
                '(' => {
                    self.pos += 1;
                    self.push(TokenKind::LParen, start);
                }
                ')' => {
                    self.pos += 1;
                    self.push(TokenKind::RParen, start);
                }
                ',' => {
                    self.pos += 1;
                    self.push(TokenKind::Comma, start);
                }
                '"' | '\'' => self.string(c, start)?,
                '=' | '<' | '>' | '!' => self.operator(c, start)?,
                '-' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                    self.number(start)?
                }
                c if c.is_ascii_digit() => self.number(start)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(start),
                other => {
                    return Err(Error::Lexical {
                        position: start,
                        character: other,
                    })
                }
            }
        }

        Ok(self.tokens)
    }

    fn operator(&mut self, c: char, start: usize) -> Result<()> {
        let next = self.peek_at(1);
        let (op, len) = match (c, next) {
            ('=', Some('=')) => (CompareOp::Eq, 2),
            ('=', _) => (CompareOp::Eq, 1),
            ('<', Some('=')) => (CompareOp::Lte, 2),
            ('<', _) => (CompareOp::Lt, 1),
            ('>', Some('=')) => (CompareOp::Gte, 2),
            ('>', _) => (CompareOp::Gt, 1),
            ('!', Some('=')) => (CompareOp::NotEq, 2),
            _ => {
                return Err(Error::Lexical {
                    position: start,
                    character: c,
                })
            }
        };
        self.pos += len;
        self.push(TokenKind::Op(op), start);
        Ok(())
    }

    fn string(&mut self, quote: char, start: usize) -> Result<()> {
        self.pos += 1;
        let mut value = String::new();

        loop {
            match self.peek() {
                None => return Err(Error::syntax(start, "unterminated string literal")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        None => return Err(Error::syntax(start, "unterminated string literal")),
                        Some(esc) if esc == quote || esc == '\\' => value.push(esc),
                        // keep other escapes verbatim, patterns rely on them
                        Some(esc) => {
                            value.push('\\');
                            value.push(esc);
                        }
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }

        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<()> {
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.input[start..self.offset()];
        let value: i64 = digits
            .parse()
            .map_err(|_| Error::syntax(start, format!("integer literal {} out of range", digits)))?;

        let unit_start = self.offset();
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let unit = &self.input[unit_start..self.offset()];
        let unit = (!unit.is_empty()).then(|| unit.to_string());

        if let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '_') {
            return Err(Error::Lexical {
                position: self.offset(),
                character: c,
            });
        }

        self.push(TokenKind::Number { value, unit }, start);
        Ok(())
    }

    fn word(&mut self, start: usize) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word = &self.input[start..self.offset()];
        let kind = if word.eq_ignore_ascii_case("and") {
            TokenKind::And
        } else if word.eq_ignore_ascii_case("or") {
            TokenKind::Or
        } else if word.eq_ignore_ascii_case("not") {
            TokenKind::Not
        } else {
            TokenKind::Ident(word.to_string())
        };
        self.push(kind, start);
    }
}
