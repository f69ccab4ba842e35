#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/alpha-crucible/ac-core/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types for the ac-core signal insertion library.
//!
//! This crate provides the signal record and its validation, the cell/row
//! model used to adapt arbitrary tabular input, and the query filter shared by
//! every storage backend.

/// The version of the ac-core-types crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod csv_table;
pub mod error;
pub mod frame;
pub mod query;
pub mod row;
pub mod signal;
pub mod source;

// Re-exports
pub use csv_table::{CsvOptions, CsvTable};
pub use error::{Result, SignalError, ValidationError};
pub use frame::{signals_to_frame, stored_signals_to_frame};
pub use query::SignalQuery;
pub use row::{Cell, RawSignalRow};
pub use signal::{Metadata, SignalKey, SignalRaw, StoredSignal};
pub use source::{OPTIONAL_COLUMNS, REQUIRED_COLUMNS, SignalSource};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
