//! Result of a batch insert.

use ac_core_types::ValidationError;
use std::collections::BTreeMap;
use std::fmt;

/// Why an input row was not written.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The row failed decoding or validation and was never submitted.
    Invalid(ValidationError),
    /// The database refused the row; its whole batch was rolled back.
    Constraint(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "invalid: {e}"),
            Self::Constraint(message) => write!(f, "constraint: {message}"),
        }
    }
}

/// A batch that was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Zero-based batch number within the call.
    pub batch: usize,
    /// Input row indices the batch held; none of them were written.
    pub rows: Vec<usize>,
    /// Input row index the database blamed, when known.
    pub offending_row: Option<usize>,
    /// Database message.
    pub reason: String,
}

/// Outcome of one insert call.
///
/// Row indices are positions in the input, starting at zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertSummary {
    /// Rows read from the input.
    pub attempted: usize,
    /// Rows written under a new key.
    pub inserted: usize,
    /// Rows that replaced an existing key.
    pub updated: usize,
    /// Rows not written, by input index.
    pub rejected: BTreeMap<usize, RejectReason>,
    /// Batches rolled back by a constraint violation.
    pub failed_batches: Vec<BatchFailure>,
    /// Non-fatal observations, e.g. repeated keys in the input.
    pub warnings: Vec<String>,
}

impl InsertSummary {
    /// Rows written, inserted or updated.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.inserted + self.updated
    }

    /// Rows in rolled-back batches that were themselves valid.
    #[must_use]
    pub fn rolled_back(&self) -> usize {
        self.failed_batches
            .iter()
            .map(|batch| {
                batch
                    .rows
                    .iter()
                    .filter(|row| Some(**row) != batch.offending_row)
                    .count()
            })
            .sum()
    }

    /// Whether every input row was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.rejected.is_empty() && self.failed_batches.is_empty()
    }
}

impl fmt::Display for InsertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} inserted, {} updated, {} rejected",
            self.attempted,
            self.inserted,
            self.updated,
            self.rejected.len()
        )?;
        if !self.failed_batches.is_empty() {
            write!(
                f,
                ", {} failed batches ({} rows rolled back)",
                self.failed_batches.len(),
                self.rolled_back()
            )?;
        }
        Ok(())
    }
}
