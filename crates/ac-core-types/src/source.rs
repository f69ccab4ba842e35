//! The row-source capability shared by every tabular input.

use crate::error::Result;
use crate::row::RawSignalRow;
use crate::signal::SignalRaw;

/// Columns every source must provide.
pub const REQUIRED_COLUMNS: [&str; 4] = ["asof_date", "ticker", "signal_name", "value"];

/// Columns a source may provide.
pub const OPTIONAL_COLUMNS: [&str; 2] = ["metadata", "created_at"];

/// Anything that can be read as a sequence of candidate signal rows.
///
/// Implementations must preserve input order: row indices reported back to
/// the caller are positions in the returned vector.
///
/// # Example
///
/// ```
/// use ac_core_types::{RawSignalRow, SignalSource};
///
/// let rows = vec![RawSignalRow::new("2024-01-15", "AAPL", "RSI", 55.0)];
/// assert_eq!(rows.signal_rows().unwrap().len(), 1);
/// ```
pub trait SignalSource {
    /// Materialize the candidate rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is structurally unusable, e.g. a
    /// required column is missing. Bad values in individual rows are not
    /// errors here; they surface when each row is decoded.
    fn signal_rows(&self) -> Result<Vec<RawSignalRow>>;
}

impl SignalSource for [RawSignalRow] {
    fn signal_rows(&self) -> Result<Vec<RawSignalRow>> {
        Ok(self.to_vec())
    }
}

impl SignalSource for Vec<RawSignalRow> {
    fn signal_rows(&self) -> Result<Vec<RawSignalRow>> {
        self.as_slice().signal_rows()
    }
}

impl SignalSource for [SignalRaw] {
    fn signal_rows(&self) -> Result<Vec<RawSignalRow>> {
        Ok(self.iter().cloned().map(RawSignalRow::from).collect())
    }
}

impl SignalSource for Vec<SignalRaw> {
    fn signal_rows(&self) -> Result<Vec<RawSignalRow>> {
        self.as_slice().signal_rows()
    }
}

/// Required columns absent from `available`.
pub(crate) fn missing_columns<'a, I>(available: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let available: Vec<&str> = available.into_iter().collect();
    REQUIRED_COLUMNS
        .iter()
        .filter(|required| !available.contains(*required))
        .map(|s| (*s).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_signal_slice_source() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let signals = vec![
            SignalRaw::new(date, "AAPL", "RSI", 55.0, None).unwrap(),
            SignalRaw::new(date, "MSFT", "RSI", 61.0, None).unwrap(),
        ];
        let rows = signals.signal_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].decode().unwrap(), signals[1]);
    }

    #[test]
    fn test_missing_columns() {
        assert!(missing_columns(["asof_date", "ticker", "signal_name", "value"]).is_empty());
        assert_eq!(
            missing_columns(["ticker", "value", "metadata"]),
            vec!["asof_date".to_string(), "signal_name".to_string()]
        );
    }
}
