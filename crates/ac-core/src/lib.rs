#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/alpha-crucible/ac-core/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Version information for the ac-core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod error;
mod inserter;
mod summary;

// ============================================================================
// Signal Types
// ============================================================================

/// Signal record, validation, row sources and query filter.
pub mod types {
    pub use ac_core_types::*;
}

// ============================================================================
// Storage
// ============================================================================

/// Database configuration and signal stores.
pub mod db {
    pub use ac_core_db::*;
}

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{ErrorKind, InsertError, Result};
pub use inserter::{DEFAULT_BATCH_SIZE, InsertOptions, SignalInserter};
pub use summary::{BatchFailure, InsertSummary, RejectReason};

pub use ac_core_db::{DatabaseConfig, DatabaseManager, DbError, MemoryStore, SignalStore};
pub use ac_core_types::{
    CsvOptions, Metadata, RawSignalRow, SignalError, SignalQuery, SignalRaw, SignalSource,
    StoredSignal, ValidationError,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
