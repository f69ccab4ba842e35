//! In-process signal store.

use crate::error::{DbError, Result};
use crate::schema::{SIGNAL_NAME_MAX_LEN, TABLE_NAME, TICKER_MAX_LEN};
use crate::store::{BatchOutcome, SignalStore};
use ac_core_types::{SignalKey, SignalQuery, SignalRaw, StoredSignal};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Access {
    #[default]
    ReadWrite,
    RowsOnly,
    ReadOnly,
    Unreachable,
}

/// A [`SignalStore`] held in memory.
///
/// Applies the same natural key, upsert, atomicity and column-length rules as
/// the `signal_raw` table. Like a fresh database, the table does not exist
/// until [`SignalStore::ensure_table`] is called.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<SignalKey, StoredSignal>,
    next_id: i64,
    batches: usize,
    table_ready: bool,
    access: Access,
}

impl MemoryStore {
    /// An empty store without the table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails as if the server were down.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            access: Access::Unreachable,
            ..Self::default()
        }
    }

    /// A store whose credential may read but not create or write.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            access: Access::ReadOnly,
            ..Self::default()
        }
    }

    /// A store whose table already exists and whose credential may write rows
    /// but not create objects.
    #[must_use]
    pub fn without_create_privilege() -> Self {
        Self {
            table_ready: true,
            access: Access::RowsOnly,
            ..Self::default()
        }
    }

    /// Number of [`SignalStore::execute_batch`] calls that reached storage.
    #[must_use]
    pub const fn batches_executed(&self) -> usize {
        self.batches
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up one stored row by key.
    #[must_use]
    pub fn get(&self, key: &SignalKey) -> Option<&StoredSignal> {
        self.rows.get(key)
    }

    fn reachable(&self) -> Result<()> {
        if self.access == Access::Unreachable {
            return Err(DbError::Connection(
                "connection refused (store marked unreachable)".to_string(),
            ));
        }
        Ok(())
    }

    fn table(&self) -> Result<()> {
        if !self.table_ready {
            return Err(DbError::Query(format!(
                "relation \"{TABLE_NAME}\" does not exist (SQLSTATE 42P01)"
            )));
        }
        Ok(())
    }
}

/// Column limits of the SQL table.
fn check_columns(signal: &SignalRaw) -> std::result::Result<(), String> {
    if signal.ticker.chars().count() > TICKER_MAX_LEN {
        return Err(format!(
            "value too long for type character varying({TICKER_MAX_LEN})"
        ));
    }
    if signal.signal_name.chars().count() > SIGNAL_NAME_MAX_LEN {
        return Err(format!(
            "value too long for type character varying({SIGNAL_NAME_MAX_LEN})"
        ));
    }
    Ok(())
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn ensure_table(&mut self) -> Result<()> {
        self.reachable()?;
        if !self.table_ready {
            if self.access != Access::ReadWrite {
                return Err(DbError::Permission(
                    "permission denied for schema public".to_string(),
                ));
            }
            self.table_ready = true;
        }
        Ok(())
    }

    async fn execute_batch(&mut self, signals: &[SignalRaw]) -> Result<BatchOutcome> {
        if signals.is_empty() {
            return Ok(BatchOutcome::default());
        }
        self.reachable()?;
        self.batches += 1;
        self.table()?;
        if self.access == Access::ReadOnly {
            return Err(DbError::Permission(format!(
                "permission denied for table {TABLE_NAME}"
            )));
        }

        // Check the whole batch before touching any row.
        for (row, signal) in signals.iter().enumerate() {
            check_columns(signal).map_err(|message| DbError::Constraint {
                row: Some(row),
                message,
            })?;
        }

        let now = Utc::now();
        let mut outcome = BatchOutcome::default();
        for signal in signals {
            let mut written = signal.clone();
            let created_at = written.created_at.take().unwrap_or(now);
            match self.rows.get_mut(&signal.key()) {
                Some(stored) => {
                    stored.signal = written;
                    stored.created_at = created_at;
                    outcome.updated += 1;
                }
                None => {
                    self.next_id += 1;
                    self.rows.insert(
                        signal.key(),
                        StoredSignal {
                            id: self.next_id,
                            signal: written,
                            created_at,
                        },
                    );
                    outcome.inserted += 1;
                }
            }
        }
        debug!(
            rows = signals.len(),
            inserted = outcome.inserted,
            updated = outcome.updated,
            "Committed signal batch in memory"
        );
        Ok(outcome)
    }

    async fn query(&mut self, query: &SignalQuery) -> Result<Vec<StoredSignal>> {
        if query.is_unsatisfiable() {
            return Ok(Vec::new());
        }
        self.reachable()?;
        self.table()?;
        let mut found: Vec<StoredSignal> = self
            .rows
            .values()
            .filter(|stored| query.matches(&stored.signal))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.signal
                .asof_date
                .cmp(&a.signal.asof_date)
                .then_with(|| a.signal.ticker.cmp(&b.signal.ticker))
                .then_with(|| a.signal.signal_name.cmp(&b.signal.signal_name))
        });
        Ok(found)
    }

    async fn test_connection(&mut self) -> bool {
        self.access != Access::Unreachable
    }

    async fn close(&mut self) {}
}
