//! Error types for expression compilation, evaluation and search.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected character '{character}' at position {position}")]
    Lexical { position: usize, character: char },

    #[error("{message} at position {position}")]
    Syntax { position: usize, message: String },

    #[error("unknown attribute \"{0}\"")]
    UnknownAttribute(String),

    #[error("unit \"{unit}\" is not a valid {dimension} unit")]
    UnitParse { unit: String, dimension: &'static str },

    #[error("{0}")]
    TypeMismatch(String),

    #[error(
        "unsupported regex type \"{0}\" (expected one of: {names})",
        names = crate::flavor::flavor_names().collect::<Vec<_>>().join(", ")
    )]
    RegexFlavor(String),

    #[error("invalid pattern \"{pattern}\": {message}")]
    RegexCompile { pattern: String, message: String },

    #[error("function \"{0}\" not found")]
    UnknownFunction(String),

    #[error("function \"{function}\" expects {expected} argument(s), got {found}")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("function \"{function}\" failed: {message}")]
    ExtensionRuntime { function: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("invalid extension manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
}

impl Error {
    /// Name of the error class, used when reporting fatal errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Lexical { .. } => "lexical error",
            Error::Syntax { .. } => "syntax error",
            Error::UnknownAttribute(_) => "unknown attribute",
            Error::UnitParse { .. } => "unit error",
            Error::TypeMismatch(_) => "type mismatch",
            Error::RegexFlavor(_) => "regex type error",
            Error::RegexCompile { .. } => "regex error",
            Error::UnknownFunction(_) => "unknown function",
            Error::ArityMismatch { .. } => "arity mismatch",
            Error::ExtensionRuntime { .. } => "extension error",
            Error::Io(_) => "io error",
            Error::Config(_) => "configuration error",
            Error::Manifest { .. } => "extension manifest error",
        }
    }

    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn runtime(function: &str, message: impl Into<String>) -> Self {
        Error::ExtensionRuntime {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
