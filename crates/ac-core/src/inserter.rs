//! Validated batch upsert.
//!
//! [`SignalInserter`] turns any [`SignalSource`] into signal records, drops
//! the rows that fail validation, and writes the rest through a
//! [`SignalStore`] in batches of at most `batch_size` rows. Each batch is one
//! transaction. Bad rows are reported in the [`InsertSummary`] and never
//! abort the call; a batch refused by a constraint is rolled back, reported,
//! and the remaining batches still run.

use crate::error::{InsertError, Result};
use crate::summary::{BatchFailure, InsertSummary, RejectReason};
use ac_core_db::{DatabaseConfig, DatabaseManager, DbError, SignalStore};
use ac_core_types::{
    CsvOptions, CsvTable, SignalKey, SignalQuery, SignalRaw, SignalSource, StoredSignal,
    stored_signals_to_frame,
};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default number of rows per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options for a batch insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOptions {
    /// Apply the signal rules (non-empty text, finite value). Rows are always
    /// decoded; disabling this only skips the semantic checks.
    pub validate: bool,
    /// Maximum rows per transaction.
    pub batch_size: usize,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            validate: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl InsertOptions {
    /// Set the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Turn semantic validation on or off.
    #[must_use]
    pub const fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    const fn check(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(InsertError::InvalidBatchSize);
        }
        Ok(())
    }
}

/// Writes signals into a [`SignalStore`].
///
/// The inserter owns its store. By default the signal table is created on the
/// first write.
///
/// # Example
///
/// ```no_run
/// use ac_core::{InsertOptions, SignalInserter, SignalQuery};
///
/// # async fn run() -> ac_core::Result<()> {
/// let mut inserter = SignalInserter::from_env()?;
/// let summary = inserter
///     .insert_from_csv("signals.csv", InsertOptions::default())
///     .await?;
/// println!("{summary}");
///
/// let stored = inserter
///     .get_existing_signals(&SignalQuery::new().with_tickers(["AAPL"]))
///     .await?;
/// println!("{} rows for AAPL", stored.len());
/// inserter.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SignalInserter<S: SignalStore = DatabaseManager> {
    store: S,
    auto_create_table: bool,
    table_ready: bool,
}

impl SignalInserter<DatabaseManager> {
    /// Create an inserter for the PostgreSQL database described by the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are malformed. No connection is made.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(DatabaseManager::from_env()?))
    }

    /// Create an inserter for the given PostgreSQL settings.
    #[must_use]
    pub const fn with_config(config: DatabaseConfig) -> Self {
        Self::new(DatabaseManager::new(config))
    }
}

impl<S: SignalStore> SignalInserter<S> {
    /// Create an inserter over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self {
            store,
            auto_create_table: true,
            table_ready: false,
        }
    }

    /// Whether to create the signal table before the first write.
    #[must_use]
    pub const fn with_auto_create_table(mut self, enabled: bool) -> Self {
        self.auto_create_table = enabled;
        self
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The underlying store, mutably.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    async fn prepare(&mut self) -> Result<()> {
        if self.auto_create_table && !self.table_ready {
            self.store.ensure_table().await?;
            self.table_ready = true;
        }
        Ok(())
    }

    /// Validate and upsert one signal.
    ///
    /// Returns `Ok(false)` when the signal is invalid or refused by a table
    /// constraint, in which case nothing was written.
    ///
    /// # Errors
    ///
    /// Returns an error on connection, permission or other storage failures.
    pub async fn insert_single_signal(&mut self, signal: &SignalRaw) -> Result<bool> {
        if let Err(e) = signal.validate() {
            warn!(ticker = %signal.ticker, signal = %signal.signal_name, error = %e, "Invalid signal");
            return Ok(false);
        }
        self.prepare().await?;
        match self.store.execute_batch(std::slice::from_ref(signal)).await {
            Ok(outcome) => {
                debug!(
                    ticker = %signal.ticker,
                    signal = %signal.signal_name,
                    inserted = outcome.inserted == 1,
                    "Upserted signal"
                );
                Ok(true)
            }
            Err(DbError::Constraint { message, .. }) => {
                warn!(ticker = %signal.ticker, signal = %signal.signal_name, error = %message, "Signal refused by database");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validate and upsert every row of a DataFrame.
    ///
    /// The frame needs `asof_date`, `ticker`, `signal_name` and `value`
    /// columns; `metadata` is optional.
    ///
    /// # Errors
    ///
    /// See [`SignalInserter::insert_from_source`].
    pub async fn insert_from_dataframe(
        &mut self,
        frame: &DataFrame,
        options: InsertOptions,
    ) -> Result<InsertSummary> {
        self.insert_from_source(frame, options).await
    }

    /// Validate and upsert every row of a comma-separated CSV file.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::FileNotFound`](crate::ErrorKind::FileNotFound) or
    /// [`ErrorKind::Parse`](crate::ErrorKind::Parse) for unreadable input,
    /// otherwise as [`SignalInserter::insert_from_source`].
    pub async fn insert_from_csv(
        &mut self,
        path: impl AsRef<Path>,
        options: InsertOptions,
    ) -> Result<InsertSummary> {
        self.insert_from_csv_with(path, &CsvOptions::default(), options)
            .await
    }

    /// Like [`SignalInserter::insert_from_csv`] with explicit CSV options.
    ///
    /// # Errors
    ///
    /// See [`SignalInserter::insert_from_csv`].
    pub async fn insert_from_csv_with(
        &mut self,
        path: impl AsRef<Path>,
        csv: &CsvOptions,
        options: InsertOptions,
    ) -> Result<InsertSummary> {
        options.check()?;
        let path = path.as_ref();
        let table = CsvTable::from_path(path, csv)?;
        info!(path = %path.display(), rows = table.len(), "Loaded signals from CSV");
        self.insert_from_source(&table, options).await
    }

    /// Validate and upsert every row of any [`SignalSource`].
    ///
    /// # Errors
    ///
    /// - [`InsertError::InvalidBatchSize`] if `batch_size` is zero
    /// - [`InsertError::Source`] if the source is structurally unusable
    /// - [`InsertError::Database`] on connection, permission or other storage
    ///   failures; batches committed before the failure stay committed
    pub async fn insert_from_source<T>(
        &mut self,
        source: &T,
        options: InsertOptions,
    ) -> Result<InsertSummary>
    where
        T: SignalSource + ?Sized,
    {
        options.check()?;
        let rows = source.signal_rows()?;
        let mut summary = InsertSummary {
            attempted: rows.len(),
            ..InsertSummary::default()
        };

        let mut indices = Vec::with_capacity(rows.len());
        let mut signals = Vec::with_capacity(rows.len());
        let mut seen: HashMap<SignalKey, usize> = HashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            let decoded = row.decode().and_then(|signal| {
                if options.validate {
                    signal.validate()?;
                }
                Ok(signal)
            });
            match decoded {
                Ok(signal) => {
                    if let Some(previous) = seen.insert(signal.key(), idx) {
                        let message = format!(
                            "row {idx} repeats the key ({}, {}, {}) of row {previous}; the later row wins",
                            signal.asof_date, signal.ticker, signal.signal_name
                        );
                        warn!("{message}");
                        summary.warnings.push(message);
                    }
                    indices.push(idx);
                    signals.push(signal);
                }
                Err(e) => {
                    debug!(row = idx, error = %e, "Rejected signal row");
                    summary.rejected.insert(idx, RejectReason::Invalid(e));
                }
            }
        }

        if signals.is_empty() {
            warn!(
                attempted = summary.attempted,
                rejected = summary.rejected.len(),
                "No valid signals to insert"
            );
            return Ok(summary);
        }

        self.prepare().await?;

        let batches = signals
            .chunks(options.batch_size)
            .zip(indices.chunks(options.batch_size));
        for (batch, (chunk, chunk_rows)) in batches.enumerate() {
            match self.store.execute_batch(chunk).await {
                Ok(outcome) => {
                    summary.inserted += outcome.inserted;
                    summary.updated += outcome.updated;
                    info!(
                        batch,
                        rows = chunk.len(),
                        inserted = outcome.inserted,
                        updated = outcome.updated,
                        "Committed signal batch"
                    );
                }
                Err(DbError::Constraint { row, message }) => {
                    let offending_row = row.and_then(|row| chunk_rows.get(row)).copied();
                    if let Some(idx) = offending_row {
                        summary
                            .rejected
                            .insert(idx, RejectReason::Constraint(message.clone()));
                    }
                    warn!(
                        batch,
                        rows = chunk.len(),
                        offending_row = ?offending_row,
                        error = %message,
                        "Signal batch rolled back"
                    );
                    summary.failed_batches.push(BatchFailure {
                        batch,
                        rows: chunk_rows.to_vec(),
                        offending_row,
                        reason: message,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            attempted = summary.attempted,
            inserted = summary.inserted,
            updated = summary.updated,
            rejected = summary.rejected.len(),
            failed_batches = summary.failed_batches.len(),
            "Signal insert finished"
        );
        Ok(summary)
    }

    /// Read stored signals passing `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn get_existing_signals(&mut self, query: &SignalQuery) -> Result<Vec<StoredSignal>> {
        self.store.query(query).await.map_err(InsertError::from)
    }

    /// Read stored signals passing `query` as a DataFrame.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the frame cannot be built.
    pub async fn get_existing_frame(&mut self, query: &SignalQuery) -> Result<DataFrame> {
        let stored = self.get_existing_signals(query).await?;
        stored_signals_to_frame(&stored).map_err(|e| InsertError::Source(e.into()))
    }

    /// Liveness check of the store. Never fails.
    pub async fn test_connection(&mut self) -> bool {
        self.store.test_connection().await
    }

    /// Release the store's connection. Safe to call more than once.
    pub async fn close(&mut self) {
        self.store.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use ac_core_db::MemoryStore;
    use ac_core_db::schema::TICKER_MAX_LEN;
    use ac_core_types::{Cell, RawSignalRow, ValidationError};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use polars::prelude::df;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn jan15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn signal(ticker: &str, value: f64) -> SignalRaw {
        SignalRaw::new(jan15(), ticker, "SENTIMENT_YT", value, None).unwrap()
    }

    fn inserter() -> SignalInserter<MemoryStore> {
        SignalInserter::new(MemoryStore::new())
    }

    fn many(n: usize) -> Vec<SignalRaw> {
        (0..n).map(|i| signal(&format!("T{i}"), i as f64)).collect()
    }

    #[tokio::test]
    async fn test_insert_then_query_by_ticker() {
        let mut inserter = inserter();
        assert!(inserter.insert_single_signal(&signal("AAPL", 0.75)).await.unwrap());
        assert!(inserter.insert_single_signal(&signal("MSFT", 0.5)).await.unwrap());

        let stored = inserter
            .get_existing_signals(&SignalQuery::new().with_tickers(["AAPL"]))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].signal, signal("AAPL", 0.75));
    }

    #[tokio::test]
    async fn test_single_invalid_signal_is_not_written() {
        let mut inserter = inserter();
        let mut bad = signal("AAPL", 0.75);
        bad.value = f64::NAN;
        assert!(!inserter.insert_single_signal(&bad).await.unwrap());
        assert_eq!(inserter.store().batches_executed(), 0);
    }

    #[tokio::test]
    async fn test_single_signal_refused_by_constraint() {
        let mut inserter = inserter();
        let long = signal(&"X".repeat(TICKER_MAX_LEN + 1), 1.0);
        assert!(!inserter.insert_single_signal(&long).await.unwrap());
        assert!(inserter.store().is_empty());
    }

    #[tokio::test]
    async fn test_batch_boundaries() {
        let mut inserter = inserter();
        let summary = inserter
            .insert_from_source(&many(1000), InsertOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.inserted, 1000);
        assert_eq!(inserter.store().batches_executed(), 1);

        let mut inserter = self::inserter();
        inserter
            .insert_from_source(&many(1001), InsertOptions::default())
            .await
            .unwrap();
        assert_eq!(inserter.store().batches_executed(), 2);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let mut inserter = inserter();
        let rows = vec![signal("AAPL", 0.75)];
        let first = inserter
            .insert_from_source(&rows, InsertOptions::default())
            .await
            .unwrap();
        let second = inserter
            .insert_from_source(&rows, InsertOptions::default())
            .await
            .unwrap();

        assert_eq!((first.inserted, first.updated), (1, 0));
        assert_eq!((second.inserted, second.updated), (0, 1));
        assert_eq!(inserter.store().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let mut inserter = inserter();
        inserter.insert_single_signal(&signal("AAPL", 0.75)).await.unwrap();
        inserter.insert_single_signal(&signal("AAPL", 0.25)).await.unwrap();

        let stored = inserter.get_existing_signals(&SignalQuery::new()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_relative_eq!(stored[0].signal.value, 0.25);
    }

    #[tokio::test]
    async fn test_invalid_rows_are_reported_and_skipped() {
        let rows = vec![
            RawSignalRow::new(jan15(), "AAPL", "SENTIMENT_YT", 0.75),
            RawSignalRow::new(jan15(), "", "SENTIMENT_YT", 0.1),
            RawSignalRow::new(jan15(), "MSFT", "  ", 0.2),
            RawSignalRow::new(jan15(), "GOOG", "SENTIMENT_YT", f64::INFINITY),
            RawSignalRow::new("not a date", "AMZN", "SENTIMENT_YT", 0.3),
            RawSignalRow::new(jan15(), "NVDA", "SENTIMENT_YT", Cell::Null),
        ];

        let mut inserter = inserter();
        let summary = inserter
            .insert_from_source(&rows, InsertOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.attempted, 6);
        assert_eq!(summary.inserted, 1);
        assert!(!summary.is_success());
        assert_eq!(summary.rejected.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(
            summary.rejected[&1],
            RejectReason::Invalid(ValidationError::EmptyTicker)
        );
        assert_eq!(
            summary.rejected[&2],
            RejectReason::Invalid(ValidationError::EmptySignalName)
        );
        assert!(matches!(
            summary.rejected[&3],
            RejectReason::Invalid(ValidationError::NonFiniteValue(_))
        ));
        assert!(matches!(
            summary.rejected[&4],
            RejectReason::Invalid(ValidationError::InvalidDate(_))
        ));
        assert_eq!(
            summary.rejected[&5],
            RejectReason::Invalid(ValidationError::MissingField("value"))
        );
        assert_eq!(inserter.store().len(), 1);
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let rows = vec![
            RawSignalRow::new(jan15(), "", "SENTIMENT_YT", 0.1),
            RawSignalRow::new("garbage", "AAPL", "SENTIMENT_YT", 0.2),
        ];
        let mut inserter = inserter();
        let summary = inserter
            .insert_from_source(&rows, InsertOptions::default().with_validation(false))
            .await
            .unwrap();

        // Decoding still applies.
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.rejected.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_constraint_failure_rolls_back_only_its_batch() {
        let long = "X".repeat(TICKER_MAX_LEN + 1);
        let rows = vec![
            signal("AAPL", 0.1),
            signal(&long, 0.2),
            signal("MSFT", 0.3),
            signal("GOOG", 0.4),
        ];

        let mut inserter = inserter();
        let summary = inserter
            .insert_from_source(&rows, InsertOptions::default().with_batch_size(2))
            .await
            .unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failed_batches.len(), 1);
        let failure = &summary.failed_batches[0];
        assert_eq!(failure.batch, 0);
        assert_eq!(failure.rows, vec![0, 1]);
        assert_eq!(failure.offending_row, Some(1));
        assert!(matches!(summary.rejected[&1], RejectReason::Constraint(_)));
        assert!(!summary.rejected.contains_key(&0));
        assert_eq!(summary.rolled_back(), 1);

        let store = inserter.store();
        assert!(store.get(&signal("AAPL", 0.0).key()).is_none());
        assert!(store.get(&signal("MSFT", 0.0).key()).is_some());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_keys_warn_and_last_wins() {
        let rows = vec![signal("AAPL", 0.1), signal("MSFT", 0.2), signal("AAPL", 0.3)];
        let mut inserter = inserter();
        let summary = inserter
            .insert_from_source(&rows, InsertOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("row 2"));
        assert_eq!((summary.inserted, summary.updated), (2, 1));
        let stored = inserter.store().get(&signal("AAPL", 0.0).key()).unwrap();
        assert_relative_eq!(stored.signal.value, 0.3);
    }

    #[tokio::test]
    async fn test_duplicate_warning_names_previous_row() {
        let rows = vec![signal("AAPL", 0.1), signal("AAPL", 0.2), signal("AAPL", 0.3)];
        let mut inserter = inserter();
        let summary = inserter
            .insert_from_source(&rows, InsertOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.warnings.len(), 2);
        assert!(summary.warnings[0].starts_with("row 1 repeats"));
        assert!(summary.warnings[0].contains("of row 0;"));
        assert!(summary.warnings[1].starts_with("row 2 repeats"));
        assert!(summary.warnings[1].contains("of row 1;"));
    }

    #[tokio::test]
    async fn test_existing_table_without_create_privilege() {
        let mut inserter = SignalInserter::new(MemoryStore::without_create_privilege());
        assert!(inserter.insert_single_signal(&signal("AAPL", 0.75)).await.unwrap());
        let summary = inserter
            .insert_from_source(&many(3), InsertOptions::default())
            .await
            .unwrap();
        assert!(summary.is_success());
        assert_eq!(inserter.store().len(), 4);
    }

    #[tokio::test]
    async fn test_created_at_column_is_written() {
        use chrono::{TimeZone, Utc};
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 21, 0, 0).unwrap();
        let frame = df! {
            "asof_date" => &["2024-01-15", "2024-01-15"],
            "ticker" => &["AAPL", "MSFT"],
            "signal_name" => &["RSI", "RSI"],
            "value" => &[55.0, 61.0],
            "created_at" => &[Some("2024-01-15T21:00:00Z"), None],
        }
        .unwrap();

        let mut inserter = inserter();
        inserter
            .insert_from_dataframe(&frame, InsertOptions::default())
            .await
            .unwrap();

        let store = inserter.store();
        let key = |ticker: &str| SignalRaw::new(jan15(), ticker, "RSI", 0.0, None).unwrap().key();
        assert_eq!(store.get(&key("AAPL")).unwrap().created_at, at);
        assert_ne!(store.get(&key("MSFT")).unwrap().created_at, at);
    }

    #[tokio::test]
    async fn test_no_valid_rows_skips_storage() {
        let rows = vec![RawSignalRow::new(jan15(), "", "RSI", 1.0)];
        let mut inserter = SignalInserter::new(MemoryStore::unreachable());
        let summary = inserter
            .insert_from_source(&rows, InsertOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.written(), 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size() {
        let mut inserter = inserter();
        let err = inserter
            .insert_from_source(&many(1), InsertOptions::default().with_batch_size(0))
            .await
            .unwrap_err();
        assert!(matches!(err, InsertError::InvalidBatchSize));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_connection_error() {
        let mut inserter = SignalInserter::new(MemoryStore::unreachable());
        assert!(!inserter.test_connection().await);
        let err = inserter
            .insert_from_source(&many(3), InsertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_read_only_store_is_permission_error() {
        let mut inserter = SignalInserter::new(MemoryStore::read_only());
        let err = inserter
            .insert_from_source(&many(3), InsertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[tokio::test]
    async fn test_without_auto_create_table() {
        let mut inserter = inserter().with_auto_create_table(false);
        let err = inserter
            .insert_from_source(&many(1), InsertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        inserter.store_mut().ensure_table().await.unwrap();
        let summary = inserter
            .insert_from_source(&many(1), InsertOptions::default())
            .await
            .unwrap();
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_insert_from_dataframe() {
        let frame = df! {
            "asof_date" => &["2024-01-15", "2024-01-16", "2024-01-17"],
            "ticker" => &["AAPL", "AAPL", ""],
            "signal_name" => &["SENTIMENT_YT", "SENTIMENT_YT", "SENTIMENT_YT"],
            "value" => &[0.75, 0.8, 0.9],
            "metadata" => &[Some(r#"{"source": "youtube"}"#), None, None],
        }
        .unwrap();

        let mut inserter = inserter();
        let summary = inserter
            .insert_from_dataframe(&frame, InsertOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.rejected.len(), 1);

        let stored = inserter
            .get_existing_signals(&SignalQuery::new().end(jan15()))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0].signal.metadata.as_ref().unwrap()["source"],
            serde_json::json!("youtube")
        );
    }

    #[tokio::test]
    async fn test_dataframe_missing_column() {
        let frame = df! {
            "asof_date" => &["2024-01-15"],
            "ticker" => &["AAPL"],
            "value" => &[0.75],
        }
        .unwrap();

        let mut inserter = inserter();
        let err = inserter
            .insert_from_dataframe(&frame, InsertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("signal_name"));
    }

    #[tokio::test]
    async fn test_insert_from_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "asof_date,ticker,signal_name,value,metadata").unwrap();
        writeln!(file, "2024-01-15,AAPL,SENTIMENT_YT,0.75,").unwrap();
        writeln!(file, "2024-01-15,MSFT,SENTIMENT_YT,abc,").unwrap();
        file.flush().unwrap();

        let mut inserter = inserter();
        let summary = inserter
            .insert_from_csv(file.path(), InsertOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.inserted, 1);
        assert!(matches!(
            summary.rejected[&1],
            RejectReason::Invalid(ValidationError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_from_missing_csv() {
        let mut inserter = inserter();
        let err = inserter
            .insert_from_csv("/nonexistent/signals.csv", InsertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[tokio::test]
    async fn test_get_existing_frame() {
        let mut inserter = inserter();
        inserter
            .insert_from_source(&many(3), InsertOptions::default())
            .await
            .unwrap();
        let frame = inserter
            .get_existing_frame(&SignalQuery::new())
            .await
            .unwrap();
        assert_eq!(frame.height(), 3);
        inserter.close().await;
        inserter.close().await;
    }
}
