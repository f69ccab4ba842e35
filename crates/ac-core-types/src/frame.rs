//! Polars DataFrame support.
//!
//! A [`DataFrame`] with the signal columns is a [`SignalSource`]; the
//! conversions in the other direction turn records back into a frame for
//! callers that prefer columnar results.

use crate::error::{Result, SignalError};
use crate::row::{Cell, RawSignalRow};
use crate::signal::{SignalRaw, StoredSignal};
use crate::source::{OPTIONAL_COLUMNS, SignalSource, missing_columns};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

impl SignalSource for DataFrame {
    fn signal_rows(&self) -> Result<Vec<RawSignalRow>> {
        let names = self.get_column_names();
        let missing = missing_columns(names.iter().map(|s| s.as_str()));
        if !missing.is_empty() {
            return Err(SignalError::MissingColumns(missing));
        }

        let asof_date = self.column("asof_date")?;
        let ticker = self.column("ticker")?;
        let signal_name = self.column("signal_name")?;
        let value = self.column("value")?;
        let [metadata, created_at] = OPTIONAL_COLUMNS.map(|name| self.column(name).ok());

        let mut rows = Vec::with_capacity(self.height());
        for i in 0..self.height() {
            rows.push(RawSignalRow {
                asof_date: to_cell(asof_date.get(i)?),
                ticker: to_cell(ticker.get(i)?),
                signal_name: to_cell(signal_name.get(i)?),
                value: to_cell(value.get(i)?),
                metadata: optional_cell(metadata, i)?,
                created_at: optional_cell(created_at, i)?,
            });
        }
        Ok(rows)
    }
}

fn optional_cell(column: Option<&Column>, i: usize) -> Result<Cell> {
    Ok(match column {
        Some(col) => to_cell(col.get(i)?),
        None => Cell::Null,
    })
}

fn to_cell(value: AnyValue<'_>) -> Cell {
    match value {
        AnyValue::Null => Cell::Null,
        AnyValue::String(s) => Cell::Text(s.to_string()),
        AnyValue::StringOwned(s) => Cell::Text(s.to_string()),
        AnyValue::Boolean(b) => Cell::Text(b.to_string()),
        AnyValue::Float64(v) => Cell::Float(v),
        AnyValue::Float32(v) => Cell::Float(f64::from(v)),
        AnyValue::Int64(v) => Cell::Int(v),
        AnyValue::Int32(v) => Cell::Int(i64::from(v)),
        AnyValue::UInt32(v) => Cell::Int(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
        AnyValue::Date(days) => days
            .checked_add(EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map_or_else(|| Cell::Text(format!("date({days})")), Cell::Date),
        AnyValue::Datetime(v, unit, _) => datetime_from_epoch(v, unit)
            .map_or_else(|| Cell::Text(format!("datetime({v})")), Cell::DateTime),
        other => Cell::Text(format!("{other:?}")),
    }
}

fn datetime_from_epoch(v: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
    };
    dt.map(|dt| dt.naive_utc())
}

/// Convert signals to a DataFrame with the standard signal columns.
///
/// Metadata is rendered as JSON text and `created_at` as a UTC timestamp,
/// each null when absent.
///
/// # Errors
///
/// Returns an error if Polars fails to assemble the frame.
pub fn signals_to_frame(signals: &[SignalRaw]) -> PolarsResult<DataFrame> {
    df! {
        "asof_date" => signals.iter().map(|s| s.asof_date).collect::<Vec<_>>(),
        "ticker" => signals.iter().map(|s| s.ticker.as_str()).collect::<Vec<_>>(),
        "signal_name" => signals.iter().map(|s| s.signal_name.as_str()).collect::<Vec<_>>(),
        "value" => signals.iter().map(|s| s.value).collect::<Vec<_>>(),
        "metadata" => signals.iter().map(SignalRaw::metadata_json).collect::<Vec<_>>(),
        "created_at" => signals
            .iter()
            .map(|s| s.created_at.map(|at| at.naive_utc()))
            .collect::<Vec<_>>(),
    }
}

/// Convert stored signals to a DataFrame, adding `id` and filling
/// `created_at` with the stored write time.
///
/// # Errors
///
/// Returns an error if Polars fails to assemble the frame.
pub fn stored_signals_to_frame(stored: &[StoredSignal]) -> PolarsResult<DataFrame> {
    let mut frame = df! {
        "id" => stored.iter().map(|s| s.id).collect::<Vec<_>>(),
    }?;
    let signals: Vec<SignalRaw> = stored.iter().map(|s| s.signal.clone()).collect();
    frame.hstack_mut(signals_to_frame(&signals)?.get_columns())?;
    // Replaces the per-record column in place.
    frame.with_column(Column::new(
        "created_at".into(),
        stored
            .iter()
            .map(|s| s.created_at.naive_utc())
            .collect::<Vec<_>>(),
    ))?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_frame_with_date_column() {
        let df = df! {
            "asof_date" => &[jan(15), jan(16)],
            "ticker" => &["AAPL", "MSFT"],
            "signal_name" => &["SENTIMENT_YT", "SENTIMENT_YT"],
            "value" => &[0.75, 0.82],
        }
        .unwrap();

        let rows = df.signal_rows().unwrap();
        assert_eq!(rows.len(), 2);
        let second = rows[1].decode().unwrap();
        assert_eq!(second.asof_date, jan(16));
        assert_eq!(second.ticker, "MSFT");
        assert_relative_eq!(second.value, 0.82);
        assert!(second.metadata.is_none());
    }

    #[test]
    fn test_frame_with_text_dates_and_metadata() {
        let df = df! {
            "asof_date" => &["2024-01-15", "not a date"],
            "ticker" => &["AAPL", "AAPL"],
            "signal_name" => &["RSI", "RSI"],
            "value" => &[Some(55.0), None],
            "metadata" => &[Some(r#"{"window": 14}"#), None],
        }
        .unwrap();

        let rows = df.signal_rows().unwrap();
        let first = rows[0].decode().unwrap();
        assert_eq!(first.metadata.unwrap()["window"], serde_json::json!(14));
        assert!(matches!(
            rows[1].decode(),
            Err(ValidationError::InvalidDate(_))
        ));
        assert_eq!(rows[1].value, Cell::Null);
    }

    #[test]
    fn test_frame_integer_values() {
        let df = df! {
            "asof_date" => &[jan(15)],
            "ticker" => &["AAPL"],
            "signal_name" => &["RANK"],
            "value" => &[3i64],
        }
        .unwrap();

        let signal = df.signal_rows().unwrap()[0].decode().unwrap();
        assert_relative_eq!(signal.value, 3.0);
    }

    #[test]
    fn test_frame_datetime_column() {
        let df = df! {
            "asof_date" => &[jan(15).and_hms_opt(21, 0, 0).unwrap()],
            "ticker" => &["AAPL"],
            "signal_name" => &["RSI"],
            "value" => &[1.0],
        }
        .unwrap();

        let signal = df.signal_rows().unwrap()[0].decode().unwrap();
        assert_eq!(signal.asof_date, jan(15));
    }

    #[test]
    fn test_frame_created_at_column() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 21, 0, 0).unwrap();
        let df = df! {
            "asof_date" => &[jan(15), jan(16)],
            "ticker" => &["AAPL", "AAPL"],
            "signal_name" => &["RSI", "RSI"],
            "value" => &[1.0, 2.0],
            "created_at" => &[Some(at.naive_utc()), None],
        }
        .unwrap();

        let rows = df.signal_rows().unwrap();
        assert_eq!(rows[0].decode().unwrap().created_at, Some(at));
        assert_eq!(rows[1].decode().unwrap().created_at, None);
    }

    #[test]
    fn test_frame_missing_columns() {
        let df = df! {
            "ticker" => &["AAPL"],
            "signal_name" => &["RSI"],
            "value" => &[0.75],
        }
        .unwrap();

        match df.signal_rows() {
            Err(SignalError::MissingColumns(cols)) => assert_eq!(cols, vec!["asof_date"]),
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn test_signals_round_trip_through_frame() {
        let mut metadata = crate::Metadata::new();
        metadata.insert("source".into(), serde_json::json!("youtube"));
        let signals = vec![
            SignalRaw::new(jan(15), "AAPL", "SENTIMENT_YT", 0.75, Some(metadata)).unwrap(),
            SignalRaw::new(jan(16), "MSFT", "SENTIMENT_YT", -0.1, None).unwrap(),
        ];

        let frame = signals_to_frame(&signals).unwrap();
        assert_eq!(frame.height(), 2);

        let back: Vec<SignalRaw> = frame
            .signal_rows()
            .unwrap()
            .iter()
            .map(|row| row.decode().unwrap())
            .collect();
        assert_eq!(back, signals);
    }

    #[test]
    fn test_stored_signals_to_frame() {
        let stored = vec![StoredSignal {
            id: 7,
            signal: SignalRaw::new(jan(15), "AAPL", "RSI", 55.0, None).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 22, 0, 0).unwrap(),
        }];

        let frame = stored_signals_to_frame(&stored).unwrap();
        assert_eq!(frame.height(), 1);
        let names: Vec<&str> = frame.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "asof_date",
                "ticker",
                "signal_name",
                "value",
                "metadata",
                "created_at"
            ]
        );
    }
}
