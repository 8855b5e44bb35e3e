//! sieve: declarative file filtering.
//!
//! Compiles filter expressions such as `size > 1kb and mtime < 2days` into an
//! expression tree and evaluates it against per-file metadata, with optional
//! calls into registered extension functions.

pub mod attributes;
pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod extension;
pub mod flavor;
pub mod query;
pub mod search;

pub use attributes::{Attribute, AttributeTable, FileType, SemanticType, UnitTable};
pub use config::Config;
pub use context::{ContextBuilder, FileContext};
pub use error::{Error, Result};
pub use eval::Evaluator;
pub use extension::{Registry, Value, ValueType};
pub use flavor::{translate_flavor, Flavor};
pub use query::{parse_expression, Expr, ParseOptions};
pub use search::Search;
