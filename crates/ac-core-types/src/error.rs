//! Error types for signal records and tabular sources.
//!
//! Two families live here. [`ValidationError`] describes why a single candidate
//! row cannot become a [`SignalRaw`](crate::SignalRaw); the inserter collects
//! these per row and never aborts on them. [`SignalError`] covers structural
//! problems with a whole source (missing columns, unreadable or malformed
//! files) and fails the call that hit it.

use std::path::PathBuf;
use thiserror::Error;

/// Reason a single candidate row was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field was null or absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A text field held a value of another kind.
    #[error("{field} must be text, got {found}")]
    NotText {
        /// Name of the offending field.
        field: &'static str,
        /// Rendering of the value that was found.
        found: String,
    },

    /// `ticker` was empty or whitespace only.
    #[error("ticker must be a non-empty string")]
    EmptyTicker,

    /// `signal_name` was empty or whitespace only.
    #[error("signal_name must be a non-empty string")]
    EmptySignalName,

    /// `value` was NaN or infinite.
    #[error("value must be a finite number, got {0}")]
    NonFiniteValue(f64),

    /// `value` could not be read as a number.
    #[error("value is not a number: {0}")]
    InvalidValue(String),

    /// `asof_date` could not be read as a calendar date.
    #[error("asof_date is not a calendar date: {0}")]
    InvalidDate(String),

    /// `created_at` was present but not a timestamp.
    #[error("created_at is not a timestamp: {0}")]
    InvalidTimestamp(String),

    /// `metadata` was present but not a JSON object.
    #[error("metadata must be a JSON object: {0}")]
    InvalidMetadata(String),
}

/// Errors raised while reading a tabular source.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The source lacks one or more required columns.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The input file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The input could not be parsed as a whole.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A single record of the input is malformed.
    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord {
        /// 1-based line number of the record.
        line: u64,
        /// Description of the problem.
        message: String,
    },

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// I/O failure other than a missing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for source operations.
pub type Result<T> = std::result::Result<T, SignalError>;
