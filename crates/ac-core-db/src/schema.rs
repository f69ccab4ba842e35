//! The `signal_raw` table.

/// Name of the signal table.
pub const TABLE_NAME: &str = "signal_raw";

/// Maximum ticker length in characters.
pub const TICKER_MAX_LEN: usize = 20;

/// Maximum signal name length in characters.
pub const SIGNAL_NAME_MAX_LEN: usize = 100;

/// Table definition.
pub const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS signal_raw (
    id BIGSERIAL PRIMARY KEY,
    asof_date DATE NOT NULL,
    ticker VARCHAR(20) NOT NULL,
    signal_name VARCHAR(100) NOT NULL,
    value DOUBLE PRECISION NOT NULL,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT signal_raw_natural_key UNIQUE (asof_date, ticker, signal_name)
)";

/// Secondary indexes.
pub const CREATE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_signal_raw_asof_date ON signal_raw (asof_date)",
    "CREATE INDEX IF NOT EXISTS idx_signal_raw_ticker ON signal_raw (ticker)",
    "CREATE INDEX IF NOT EXISTS idx_signal_raw_signal_name ON signal_raw (signal_name)",
    "CREATE INDEX IF NOT EXISTS idx_signal_raw_asof_date_ticker ON signal_raw (asof_date, ticker)",
];

/// Every DDL statement, in execution order.
pub fn schema_statements() -> impl Iterator<Item = &'static str> {
    std::iter::once(CREATE_TABLE).chain(CREATE_INDEXES)
}

/// Whether the table is already visible on the search path.
///
/// Checked before any DDL: `CREATE ... IF NOT EXISTS` still needs CREATE on
/// the schema, which a row-writing role may lack.
pub(crate) const TABLE_EXISTS: &str = "SELECT to_regclass('signal_raw') IS NOT NULL";

/// Upsert a whole batch from parallel arrays in one statement; yields one
/// `inserted` flag per written row. Keys must be unique within the arrays.
pub(crate) const UPSERT_BATCH: &str = r"
INSERT INTO signal_raw (asof_date, ticker, signal_name, value, metadata, created_at)
SELECT b.asof_date, b.ticker, b.signal_name, b.value, b.metadata, COALESCE(b.created_at, NOW())
FROM UNNEST($1::date[], $2::text[], $3::text[], $4::float8[], $5::jsonb[], $6::timestamptz[])
  AS b (asof_date, ticker, signal_name, value, metadata, created_at)
ON CONFLICT (asof_date, ticker, signal_name) DO UPDATE
  SET value = EXCLUDED.value,
      metadata = EXCLUDED.metadata,
      created_at = EXCLUDED.created_at
RETURNING (xmax = 0) AS inserted";

/// Upsert one signal; used to find the row that failed a batch.
pub(crate) const UPSERT_SIGNAL: &str = r"
INSERT INTO signal_raw (asof_date, ticker, signal_name, value, metadata, created_at)
VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()))
ON CONFLICT (asof_date, ticker, signal_name) DO UPDATE
  SET value = EXCLUDED.value,
      metadata = EXCLUDED.metadata,
      created_at = EXCLUDED.created_at
RETURNING (xmax = 0) AS inserted";

/// Select list for read-back; filters and ordering are appended.
pub(crate) const SELECT_SIGNALS: &str =
    "SELECT id, asof_date, ticker, signal_name, value, metadata, created_at FROM signal_raw";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_order() {
        let statements: Vec<&str> = schema_statements().collect();
        assert_eq!(statements.len(), 5);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS signal_raw"));
        assert!(statements[1..].iter().all(|s| s.starts_with("CREATE INDEX IF NOT EXISTS")));
    }

    #[test]
    fn test_column_limits_match_ddl() {
        assert!(CREATE_TABLE.contains(&format!("ticker VARCHAR({TICKER_MAX_LEN})")));
        assert!(CREATE_TABLE.contains(&format!("signal_name VARCHAR({SIGNAL_NAME_MAX_LEN})")));
    }

    #[test]
    fn test_upsert_overwrites_metadata() {
        for sql in [UPSERT_BATCH, UPSERT_SIGNAL] {
            assert!(sql.contains("metadata = EXCLUDED.metadata"));
            assert!(sql.contains("ON CONFLICT (asof_date, ticker, signal_name)"));
            assert!(sql.contains("COALESCE("));
        }
    }

    #[test]
    fn test_batch_upsert_is_one_statement() {
        assert!(UPSERT_BATCH.contains("FROM UNNEST("));
        assert_eq!(UPSERT_BATCH.matches("INSERT INTO").count(), 1);
        // One array parameter per written column.
        assert!(UPSERT_BATCH.contains("$6::timestamptz[]"));
        assert!(!UPSERT_BATCH.contains("$7"));
    }

    #[test]
    fn test_table_exists_check_runs_no_ddl() {
        assert!(TABLE_EXISTS.contains(&format!("to_regclass('{TABLE_NAME}')")));
        assert!(!TABLE_EXISTS.contains("CREATE"));
    }
}
