//! CSV input.
//!
//! A [`CsvTable`] is a CSV file read into candidate rows. The header row
//! decides which column feeds which field; column order and extra columns do
//! not matter, and headers are matched case-insensitively after trimming.
//! Every cell is kept as text and interpreted when the row is decoded.

use crate::error::{Result, SignalError};
use crate::row::{Cell, RawSignalRow};
use crate::source::{OPTIONAL_COLUMNS, SignalSource, missing_columns};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Options controlling how CSV input is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvOptions {
    /// Use a different field delimiter, e.g. `b';'` or `b'\t'`.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// A CSV file parsed into candidate signal rows.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    rows: Vec<RawSignalRow>,
    lines: Vec<u64>,
}

impl CsvTable {
    /// Read a CSV file from disk.
    ///
    /// # Errors
    ///
    /// - [`SignalError::FileNotFound`] if `path` does not exist
    /// - [`SignalError::Parse`] if the file is empty or holds no data rows
    /// - [`SignalError::MissingColumns`] if a required header is absent
    /// - [`SignalError::MalformedRecord`] if a record cannot be read
    pub fn from_path(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SignalError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(SignalError::Parse("CSV file is empty".to_string()));
        }
        let table = Self::from_reader(file, options)?;
        tracing::debug!(path = %path.display(), rows = table.len(), "Read CSV file");
        Ok(table)
    }

    /// Read CSV data from any reader.
    ///
    /// # Errors
    ///
    /// Same as [`CsvTable::from_path`], minus the file checks.
    pub fn from_reader<R: Read>(reader: R, options: &CsvOptions) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| SignalError::Parse(format!("Failed to read CSV headers: {e}")))?
            .clone();
        if headers.iter().all(str::is_empty) {
            return Err(SignalError::Parse("CSV file is empty".to_string()));
        }

        let header_map = build_header_map(&headers);
        let missing = missing_columns(header_map.keys().map(String::as_str));
        if !missing.is_empty() {
            return Err(SignalError::MissingColumns(missing));
        }
        let columns = ColumnIndex::resolve(&header_map);

        let mut rows = Vec::new();
        let mut lines = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result.map_err(|e| SignalError::MalformedRecord {
                line: e.position().map_or(idx as u64 + 2, csv::Position::line),
                message: e.to_string(),
            })?;
            lines.push(record.position().map_or(idx as u64 + 2, csv::Position::line));
            rows.push(columns.row(&record));
        }

        if rows.is_empty() {
            return Err(SignalError::Parse(
                "CSV file contains no data rows".to_string(),
            ));
        }
        Ok(Self { rows, lines })
    }

    /// Number of data rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 1-based line on which data row `row` starts.
    ///
    /// Quoted fields may span lines, so this is not always `row + 2`.
    #[must_use]
    pub fn line(&self, row: usize) -> Option<u64> {
        self.lines.get(row).copied()
    }

    /// The parsed rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[RawSignalRow] {
        &self.rows
    }
}

impl SignalSource for CsvTable {
    fn signal_rows(&self) -> Result<Vec<RawSignalRow>> {
        Ok(self.rows.clone())
    }
}

/// Positions of the signal columns within a record.
struct ColumnIndex {
    asof_date: usize,
    ticker: usize,
    signal_name: usize,
    value: usize,
    metadata: Option<usize>,
    created_at: Option<usize>,
}

impl ColumnIndex {
    fn resolve(header_map: &HashMap<String, usize>) -> Self {
        // Required columns are checked by the caller.
        let at = |name: &str| header_map.get(name).copied().unwrap_or_default();
        let [metadata, created_at] = OPTIONAL_COLUMNS.map(|name| header_map.get(name).copied());
        Self {
            asof_date: at("asof_date"),
            ticker: at("ticker"),
            signal_name: at("signal_name"),
            value: at("value"),
            metadata,
            created_at,
        }
    }

    fn row(&self, record: &StringRecord) -> RawSignalRow {
        RawSignalRow {
            asof_date: text_cell(record, self.asof_date),
            ticker: text_cell(record, self.ticker),
            signal_name: text_cell(record, self.signal_name),
            value: text_cell(record, self.value),
            metadata: optional_cell(record, self.metadata),
            created_at: optional_cell(record, self.created_at),
        }
    }
}

/// Empty fields read as null.
fn text_cell(record: &StringRecord, idx: usize) -> Cell {
    match record.get(idx) {
        Some(s) if !s.is_empty() => Cell::Text(s.to_string()),
        _ => Cell::Null,
    }
}

fn optional_cell(record: &StringRecord, idx: Option<usize>) -> Cell {
    idx.map_or(Cell::Null, |idx| text_cell(record, idx))
}

fn normalize_header(h: &str) -> String {
    h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, h) in headers.iter().enumerate() {
        map.entry(normalize_header(h)).or_insert(idx);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table(text: &str) -> Result<CsvTable> {
        CsvTable::from_reader(text.as_bytes(), &CsvOptions::default())
    }

    #[test]
    fn test_reads_rows_in_order() {
        let t = table(
            "asof_date,ticker,signal_name,value,metadata\n\
             2024-01-15,AAPL,SENTIMENT_YT,0.75,\"{\"\"source\"\": \"\"youtube\"\"}\"\n\
             2024-01-15,MSFT,SENTIMENT_YT,0.82,\n",
        )
        .unwrap();
        assert_eq!(t.len(), 2);

        let first = t.rows()[0].decode().unwrap();
        assert_eq!(first.ticker, "AAPL");
        assert_eq!(
            first.metadata.unwrap()["source"],
            serde_json::json!("youtube")
        );
        let second = t.rows()[1].decode().unwrap();
        assert_eq!(second.ticker, "MSFT");
        assert!(second.metadata.is_none());
    }

    #[test]
    fn test_header_order_case_and_extra_columns() {
        let t = table(
            "\u{feff}Value , TICKER,notes,Signal_Name,asof_date\n\
             1.5,AAPL,ignored,RSI,2024/01/15\n",
        )
        .unwrap();
        let signal = t.rows()[0].decode().unwrap();
        assert_eq!(signal.asof_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(signal.signal_name, "RSI");
        assert_eq!(signal.value, 1.5);
        assert!(t.rows()[0].metadata.is_null());
    }

    #[test]
    fn test_missing_columns() {
        match table("ticker,signal_name,value\nAAPL,RSI,1.0\n") {
            Err(SignalError::MissingColumns(cols)) => assert_eq!(cols, vec!["asof_date"]),
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn test_header_only_is_parse_error() {
        let err = table("asof_date,ticker,signal_name,value\n").unwrap_err();
        assert!(matches!(err, SignalError::Parse(_)));
    }

    #[test]
    fn test_blank_input_is_parse_error() {
        let err = table("\n").unwrap_err();
        assert!(matches!(err, SignalError::Parse(_)));
    }

    #[test]
    fn test_ragged_record_reports_line() {
        let err = table(
            "asof_date,ticker,signal_name,value\n\
             2024-01-15,AAPL,RSI,1.0\n\
             2024-01-15,MSFT,RSI\n",
        )
        .unwrap_err();
        match err {
            SignalError::MalformedRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_fields_are_null() {
        let t = table("asof_date,ticker,signal_name,value\n2024-01-15,,RSI,\n").unwrap();
        assert_eq!(
            t.rows()[0].decode(),
            Err(ValidationError::MissingField("ticker"))
        );
        assert!(t.rows()[0].value.is_null());
    }

    #[test]
    fn test_line_numbers_follow_multiline_fields() {
        let t = table(
            "asof_date,ticker,signal_name,value,metadata\n\
             2024-01-15,AAPL,RSI,1.0,\"{\"\"note\"\":\n\"\"two lines\"\"}\"\n\
             2024-01-15,MSFT,RSI,2.0,\n",
        )
        .unwrap();
        assert_eq!(t.line(0), Some(2));
        assert_eq!(t.line(1), Some(4));
        assert_eq!(t.line(2), None);
        assert!(t.rows()[0].decode().unwrap().metadata.is_some());
    }

    #[test]
    fn test_created_at_column() {
        let t = table(
            "asof_date,ticker,signal_name,value,Created_At\n\
             2024-01-15,AAPL,RSI,1.0,2024-01-15 21:00:00\n\
             2024-01-15,MSFT,RSI,2.0,\n",
        )
        .unwrap();
        let stamped = t.rows()[0].decode().unwrap();
        assert_eq!(
            stamped.created_at.map(|at| at.to_rfc3339()),
            Some("2024-01-15T21:00:00+00:00".to_string())
        );
        assert!(t.rows()[1].decode().unwrap().created_at.is_none());
    }

    #[test]
    fn test_custom_delimiter() {
        let options = CsvOptions::default().with_delimiter(b';');
        let t = CsvTable::from_reader(
            "asof_date;ticker;signal_name;value\n2024-01-15;AAPL;RSI;2,5\n".as_bytes(),
            &options,
        )
        .unwrap();
        assert!(matches!(
            t.rows()[0].decode(),
            Err(ValidationError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "asof_date,ticker,signal_name,value").unwrap();
        writeln!(file, "2024-01-15,AAPL,RSI,55.0").unwrap();
        file.flush().unwrap();

        let t = CsvTable::from_path(file.path(), &CsvOptions::default()).unwrap();
        assert_eq!(t.signal_rows().unwrap().len(), 1);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = CsvTable::from_path("/nonexistent/signals.csv", &CsvOptions::default())
            .unwrap_err();
        assert!(matches!(err, SignalError::FileNotFound(_)));
        assert!(err.to_string().contains("/nonexistent/signals.csv"));
    }

    #[test]
    fn test_from_path_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let err = CsvTable::from_path(file.path(), &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, SignalError::Parse(_)));
    }
}
