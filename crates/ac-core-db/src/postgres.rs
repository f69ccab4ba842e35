//! PostgreSQL connection manager.

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result, classify, classify_row, is_row_error};
use crate::schema::{
    SELECT_SIGNALS, TABLE_EXISTS, TABLE_NAME, UPSERT_BATCH, UPSERT_SIGNAL, schema_statements,
};
use crate::store::{BatchOutcome, SignalStore};
use ac_core_types::{SignalKey, SignalQuery, SignalRaw, StoredSignal};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Owns one PostgreSQL connection to the signal database.
///
/// The connection is opened on first use and reopened after a
/// connection-class failure. There is no pool.
///
/// A batch is written by a single statement, so it commits or fails as a
/// whole. Only when that statement is refused for its data are the rows
/// replayed one at a time, inside a transaction that is rolled back, to name
/// the offending row.
///
/// # Example
///
/// ```no_run
/// use ac_core_db::{DatabaseManager, SignalStore};
///
/// # async fn run() -> ac_core_db::Result<()> {
/// let mut db = DatabaseManager::from_env()?;
/// db.ensure_table().await?;
/// assert!(db.test_connection().await);
/// db.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DatabaseManager {
    config: DatabaseConfig,
    conn: Option<PgConnection>,
    write_statements: usize,
}

impl DatabaseManager {
    /// Create a manager; nothing is opened until first use.
    #[must_use]
    pub const fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            conn: None,
            write_statements: 0,
        }
    }

    /// Create a manager from environment settings.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the settings are malformed.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(DatabaseConfig::from_env()?))
    }

    /// The settings in use.
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Whether a connection is currently open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Number of upsert statements sent so far, including row-by-row
    /// replays of refused batches.
    #[must_use]
    pub const fn write_statements(&self) -> usize {
        self.write_statements
    }

    /// Open the connection if it is not already open.
    ///
    /// # Errors
    ///
    /// [`DbError::Connection`] on an unreachable host, rejected credentials,
    /// failed TLS negotiation or timeout; [`DbError::Config`] on bad settings.
    pub async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let options = self.config.connect_options()?;
        let target = self.config.redacted_target();
        let timeout = self.config.connect_timeout;

        let conn = match tokio::time::timeout(timeout, PgConnection::connect_with(&options)).await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                let err = connect_error(e);
                warn!(database = %target, error = %err, "Database connection failed");
                return Err(err);
            }
            Err(_) => {
                let err = DbError::Connection(format!(
                    "timed out after {}s connecting to {target}",
                    timeout.as_secs()
                ));
                warn!(database = %target, error = %err, "Database connection failed");
                return Err(err);
            }
        };

        info!(database = %target, "Connected to database");
        self.conn = Some(conn);
        Ok(())
    }

    async fn connection(&mut self) -> Result<&mut PgConnection> {
        if self.conn.is_none() {
            self.connect().await?;
        }
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::Connection("connection unavailable".to_string()))
    }

    /// Forget a broken connection so the next call reconnects.
    fn observe(&mut self, err: DbError) -> DbError {
        if err.is_connection() && self.conn.take().is_some() {
            warn!(error = %err, "Dropping broken database connection");
        }
        err
    }
}

#[async_trait]
impl SignalStore for DatabaseManager {
    async fn ensure_table(&mut self) -> Result<()> {
        let result = {
            let conn = self.connection().await?;
            create_schema(conn).await
        };
        if result.map_err(|e| self.observe(e))? {
            info!(table = TABLE_NAME, "Created signal table");
        } else {
            debug!(table = TABLE_NAME, "Signal table already exists");
        }
        Ok(())
    }

    async fn execute_batch(&mut self, signals: &[SignalRaw]) -> Result<BatchOutcome> {
        if signals.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let mut statements = 0;
        let result = {
            let conn = self.connection().await?;
            upsert_batch(conn, signals, &mut statements).await
        };
        self.write_statements += statements;
        result.map_err(|e| self.observe(e))
    }

    async fn query(&mut self, query: &SignalQuery) -> Result<Vec<StoredSignal>> {
        if query.is_unsatisfiable() {
            debug!(start = ?query.start_date, end = ?query.end_date, "Empty date range");
            return Ok(Vec::new());
        }
        let result = {
            let conn = self.connection().await?;
            fetch_signals(conn, query).await
        };
        result.map_err(|e| self.observe(e))
    }

    async fn test_connection(&mut self) -> bool {
        let result = match self.connection().await {
            Ok(conn) => sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(conn)
                .await
                .map_err(classify),
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Database connection test failed");
                self.observe(e);
                false
            }
        }
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close().await {
                Ok(()) => info!("Database connection closed"),
                Err(e) => warn!(error = %e, "Error closing database connection"),
            }
        }
    }
}

/// Failures while opening a connection are connection errors unless they
/// are about configuration or privileges.
fn connect_error(err: sqlx::Error) -> DbError {
    match classify(err) {
        e @ (DbError::Config(_) | DbError::Connection(_) | DbError::Permission(_)) => e,
        DbError::Constraint { message, .. } => DbError::Connection(message),
        DbError::Query(message) | DbError::Decode(message) => DbError::Connection(message),
    }
}

/// Returns whether the table had to be created.
async fn create_schema(conn: &mut PgConnection) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(TABLE_EXISTS)
        .fetch_one(&mut *conn)
        .await
        .map_err(classify)?;
    if exists {
        return Ok(false);
    }
    for statement in schema_statements() {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(classify)?;
    }
    Ok(true)
}

/// Keep the last occurrence of each key, at the position of its first.
///
/// One statement cannot touch the same row twice, and the last row of a
/// batch wins when rows are written in order.
fn collapse_keys(signals: &[SignalRaw]) -> Vec<&SignalRaw> {
    let mut positions: HashMap<SignalKey, usize> = HashMap::with_capacity(signals.len());
    let mut unique: Vec<&SignalRaw> = Vec::with_capacity(signals.len());
    for signal in signals {
        match positions.get(&signal.key()) {
            Some(&pos) => unique[pos] = signal,
            None => {
                positions.insert(signal.key(), unique.len());
                unique.push(signal);
            }
        }
    }
    unique
}

async fn upsert_batch(
    conn: &mut PgConnection,
    signals: &[SignalRaw],
    statements: &mut usize,
) -> Result<BatchOutcome> {
    let unique = collapse_keys(signals);
    // Earlier rows of a repeated key are overwritten by the later one.
    let superseded = signals.len() - unique.len();

    let mut asof_dates: Vec<NaiveDate> = Vec::with_capacity(unique.len());
    let mut tickers: Vec<String> = Vec::with_capacity(unique.len());
    let mut signal_names: Vec<String> = Vec::with_capacity(unique.len());
    let mut values: Vec<f64> = Vec::with_capacity(unique.len());
    let mut metadata: Vec<Option<serde_json::Value>> = Vec::with_capacity(unique.len());
    let mut created_at: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(unique.len());
    for signal in &unique {
        asof_dates.push(signal.asof_date);
        tickers.push(signal.ticker.clone());
        signal_names.push(signal.signal_name.clone());
        values.push(signal.value);
        metadata.push(signal.metadata.clone().map(serde_json::Value::Object));
        created_at.push(signal.created_at);
    }

    *statements += 1;
    let flags = sqlx::query_scalar::<_, bool>(UPSERT_BATCH)
        .bind(asof_dates)
        .bind(tickers)
        .bind(signal_names)
        .bind(values)
        .bind(metadata)
        .bind(created_at)
        .fetch_all(&mut *conn)
        .await;

    match flags {
        Ok(flags) => {
            let inserted = flags.iter().filter(|inserted| **inserted).count();
            let outcome = BatchOutcome {
                inserted,
                updated: flags.len() - inserted + superseded,
            };
            debug!(
                rows = signals.len(),
                inserted = outcome.inserted,
                updated = outcome.updated,
                "Committed signal batch"
            );
            Ok(outcome)
        }
        Err(e) if is_row_error(&e) => {
            let row = locate_failing_row(conn, signals, statements).await?;
            Err(classify_row(e, row))
        }
        Err(e) => Err(classify(e)),
    }
}

/// Replay `signals` one row at a time inside a transaction that is always
/// rolled back, and return the first row the server refuses.
async fn locate_failing_row(
    conn: &mut PgConnection,
    signals: &[SignalRaw],
    statements: &mut usize,
) -> Result<Option<usize>> {
    let mut tx = conn.begin().await.map_err(classify)?;
    let mut failing = None;

    for (row, signal) in signals.iter().enumerate() {
        *statements += 1;
        let result = sqlx::query_scalar::<_, bool>(UPSERT_SIGNAL)
            .bind(signal.asof_date)
            .bind(&signal.ticker)
            .bind(&signal.signal_name)
            .bind(signal.value)
            .bind(signal.metadata.clone().map(serde_json::Value::Object))
            .bind(signal.created_at)
            .fetch_one(&mut *tx)
            .await;
        match result {
            Ok(_) => {}
            Err(e) if is_row_error(&e) => {
                failing = Some(row);
                break;
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                return Err(classify(e));
            }
        }
    }

    tx.rollback().await.map_err(classify)?;
    Ok(failing)
}

async fn fetch_signals(conn: &mut PgConnection, query: &SignalQuery) -> Result<Vec<StoredSignal>> {
    let mut builder = QueryBuilder::<Postgres>::new(SELECT_SIGNALS);
    builder.push(" WHERE TRUE");
    if !query.tickers.is_empty() {
        builder
            .push(" AND ticker = ANY(")
            .push_bind(query.tickers.clone())
            .push(")");
    }
    if !query.signal_names.is_empty() {
        builder
            .push(" AND signal_name = ANY(")
            .push_bind(query.signal_names.clone())
            .push(")");
    }
    if let Some(start) = query.start_date {
        builder.push(" AND asof_date >= ").push_bind(start);
    }
    if let Some(end) = query.end_date {
        builder.push(" AND asof_date <= ").push_bind(end);
    }
    builder.push(" ORDER BY asof_date DESC, ticker, signal_name");

    let rows = builder
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(classify)?;
    rows.iter().map(stored_signal).collect()
}

fn stored_signal(row: &PgRow) -> Result<StoredSignal> {
    let metadata = match row
        .try_get::<Option<serde_json::Value>, _>("metadata")
        .map_err(classify)?
    {
        Some(serde_json::Value::Object(map)) => Some(map),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => {
            return Err(DbError::Decode(format!(
                "metadata is not a JSON object: {other}"
            )));
        }
    };

    Ok(StoredSignal {
        id: row.try_get("id").map_err(classify)?,
        signal: SignalRaw {
            asof_date: row.try_get("asof_date").map_err(classify)?,
            ticker: row.try_get("ticker").map_err(classify)?,
            signal_name: row.try_get("signal_name").map_err(classify)?,
            value: row.try_get("value").map_err(classify)?,
            metadata,
            created_at: None,
        },
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(classify)?,
    })
}
