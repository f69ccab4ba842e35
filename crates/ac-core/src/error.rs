//! Error type for inserter calls.

use ac_core_db::DbError;
use ac_core_types::SignalError;
use std::fmt;
use thiserror::Error;

/// Errors that abort an inserter call.
///
/// Per-row validation failures are not errors; they are reported in the
/// [`InsertSummary`](crate::InsertSummary).
#[derive(Debug, Error)]
pub enum InsertError {
    /// Storage failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The input source could not be read.
    #[error(transparent)]
    Source(#[from] SignalError),

    /// `batch_size` was zero.
    #[error("batch_size must be at least 1")]
    InvalidBatchSize,
}

/// Coarse classification of an [`InsertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unreachable database, rejected credentials or broken connection.
    Connection,
    /// Insufficient database privileges.
    Permission,
    /// Malformed input.
    Parse,
    /// Input file does not exist.
    FileNotFound,
    /// A row violated a table constraint.
    Constraint,
    /// Anything else.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Permission => "permission",
            Self::Parse => "parse",
            Self::FileNotFound => "file not found",
            Self::Constraint => "constraint",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl InsertError {
    /// Which kind of failure this is.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(e) => match e {
                DbError::Connection(_) => ErrorKind::Connection,
                DbError::Permission(_) => ErrorKind::Permission,
                DbError::Constraint { .. } => ErrorKind::Constraint,
                DbError::Config(_) | DbError::Query(_) | DbError::Decode(_) => ErrorKind::Other,
            },
            Self::Source(e) => match e {
                SignalError::FileNotFound(_) => ErrorKind::FileNotFound,
                SignalError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    ErrorKind::FileNotFound
                }
                SignalError::MissingColumns(_)
                | SignalError::Parse(_)
                | SignalError::MalformedRecord { .. } => ErrorKind::Parse,
                SignalError::Polars(_) | SignalError::Io(_) => ErrorKind::Other,
            },
            Self::InvalidBatchSize => ErrorKind::Other,
        }
    }
}

/// A specialized Result type for inserter calls.
pub type Result<T> = std::result::Result<T, InsertError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kinds() {
        let cases = [
            (
                InsertError::from(DbError::Connection("refused".into())),
                ErrorKind::Connection,
            ),
            (
                InsertError::from(DbError::Permission("denied".into())),
                ErrorKind::Permission,
            ),
            (
                InsertError::from(SignalError::FileNotFound(PathBuf::from("x.csv"))),
                ErrorKind::FileNotFound,
            ),
            (
                InsertError::from(SignalError::Parse("CSV file is empty".into())),
                ErrorKind::Parse,
            ),
            (
                InsertError::from(SignalError::MissingColumns(vec!["value".into()])),
                ErrorKind::Parse,
            ),
            (InsertError::InvalidBatchSize, ErrorKind::Other),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_display_is_transparent() {
        let err = InsertError::from(DbError::Permission("permission denied for table signal_raw".into()));
        assert_eq!(
            err.to_string(),
            "Permission denied: permission denied for table signal_raw"
        );
    }
}
