//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while parsing a single trace line
///
/// These are never fatal: the stream driver counts them and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("too few fields: expected at least {expected}, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("bad value in column {column}: {value:?}")]
    BadField { column: usize, value: String },
}

/// Errors that halt a correlation run
#[derive(Error, Debug)]
pub enum CorrelateError {
    #[error("Input unavailable: {0}")]
    InputUnavailable(#[source] std::io::Error),

    #[error("Failed to read input: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("Reader thread terminated unexpectedly")]
    ReaderPanicked,

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
