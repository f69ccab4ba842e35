//! The storage seam between the inserter and a database.

use crate::error::Result;
use ac_core_types::{SignalQuery, SignalRaw, StoredSignal};
use async_trait::async_trait;

/// Row counts from one committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows whose key was new.
    pub inserted: usize,
    /// Rows that replaced an existing key.
    pub updated: usize,
}

impl BatchOutcome {
    /// Total rows written.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// A place signals are upserted into and read back from.
///
/// A store owns its connection exclusively; methods take `&mut self` and
/// callers needing concurrency hold one store each.
#[async_trait]
pub trait SignalStore: Send {
    /// Create the signal table and indexes if absent. When the table exists
    /// nothing is created and no CREATE privilege is needed.
    ///
    /// # Errors
    ///
    /// [`DbError::Permission`](crate::DbError::Permission) when the
    /// credential cannot create objects, or any connection error.
    async fn ensure_table(&mut self) -> Result<()>;

    /// Upsert `signals` as one atomic unit.
    ///
    /// Either every row is written or none is.
    ///
    /// # Errors
    ///
    /// [`DbError::Constraint`](crate::DbError::Constraint) when a row is
    /// refused for its data, naming the offending row index within `signals`
    /// when it can be singled out; nothing from the batch was written.
    async fn execute_batch(&mut self, signals: &[SignalRaw]) -> Result<BatchOutcome>;

    /// Read stored signals passing `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn query(&mut self, query: &SignalQuery) -> Result<Vec<StoredSignal>>;

    /// Liveness check. Never fails; any problem reads as `false`.
    async fn test_connection(&mut self) -> bool;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&mut self);
}
