//! Filter expression language.
//!
//! # Syntax Overview
//!
//! - **Comparisons**: `size > 1kb`, `mtime = 6days`, `name = "*.txt"`
//! - **Flags**: `readable`, `not empty`
//! - **Boolean operators**: `and`, `or`, `not`, parentheses
//! - **Function calls**: `c_add(19, 4) = 23`, `is_image()`
//!
//! Units are accepted glued to the number or as the following word
//! (`5kb`, `5 kilobytes`). A bare size is in bytes and a bare time in minutes.

mod ast;
mod lexer;
mod parser;

pub use ast::{CompareOp, Comparison, Expr, FunctionCall, Literal, Operand, Pattern};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse, parse_expression, ParseOptions};

#[cfg(test)]
mod tests;
