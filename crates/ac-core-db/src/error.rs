//! Error types for database access.

use thiserror::Error;

/// SQLSTATE for `insufficient_privilege`.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Errors that can occur when talking to signal storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    /// The connection settings are unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database is unreachable, refused the credentials, or the
    /// connection broke mid-call.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The credential lacks a required privilege.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// A row of a batch violated a table constraint; the batch was rolled back.
    #[error(
        "Constraint violation{}: {message}",
        .row.map(|row| format!(" at batch row {row}")).unwrap_or_default()
    )]
    Constraint {
        /// Index of the offending row within the submitted batch, when it
        /// could be singled out.
        row: Option<usize>,
        /// Database message.
        message: String,
    },

    /// Any other statement failure.
    #[error("Query failed: {0}")]
    Query(String),

    /// A stored row could not be read back.
    #[error("Failed to decode stored row: {0}")]
    Decode(String),
}

impl DbError {
    /// Whether the error means the connection is unusable.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// A specialized Result type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;

/// Map a driver error onto [`DbError`].
pub(crate) fn classify(err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            let message = db.message().to_string();
            if code == INSUFFICIENT_PRIVILEGE {
                DbError::Permission(message)
            } else if code.starts_with("08") || code.starts_with("28") {
                DbError::Connection(message)
            } else {
                DbError::Query(format!("{message} (SQLSTATE {code})"))
            }
        }
        e @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed) => DbError::Connection(e.to_string()),
        e @ sqlx::Error::Configuration(_) => DbError::Config(e.to_string()),
        e @ (sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }) => DbError::Decode(e.to_string()),
        e => DbError::Query(e.to_string()),
    }
}

/// Whether a write failed because of the data it carried: a data exception
/// (class 22) or an integrity violation (class 23).
pub(crate) fn is_row_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().unwrap_or_default();
            code.starts_with("22") || code.starts_with("23")
        }
        _ => false,
    }
}

/// Map a driver error raised while writing a batch; `row` is the offending
/// row when known.
///
/// Row errors (see [`is_row_error`]) become [`DbError::Constraint`];
/// everything else goes through [`classify`].
pub(crate) fn classify_row(err: sqlx::Error, row: Option<usize>) -> DbError {
    if is_row_error(&err)
        && let sqlx::Error::Database(db) = &err
    {
        return DbError::Constraint {
            row,
            message: db.message().to_string(),
        };
    }
    classify(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_connection_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify(sqlx::Error::Io(io));
        assert!(err.is_connection());
    }

    #[test]
    fn test_decode_errors() {
        let err = classify(sqlx::Error::ColumnNotFound("metadata".into()));
        assert!(matches!(err, DbError::Decode(_)));
    }

    #[test]
    fn test_non_database_row_error_is_not_constraint() {
        assert!(!is_row_error(&sqlx::Error::RowNotFound));
        let err = classify_row(sqlx::Error::RowNotFound, Some(3));
        assert!(matches!(err, DbError::Query(_)));
    }

    #[test]
    fn test_constraint_display() {
        let err = DbError::Constraint {
            row: Some(2),
            message: "value too long for type character varying(20)".into(),
        };
        assert_eq!(
            err.to_string(),
            "Constraint violation at batch row 2: value too long for type character varying(20)"
        );

        let err = DbError::Constraint {
            row: None,
            message: "duplicate key".into(),
        };
        assert_eq!(err.to_string(), "Constraint violation: duplicate key");
    }
}
