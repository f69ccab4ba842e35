//! Loosely typed rows read from tabular input.
//!
//! Every tabular source is reduced to [`RawSignalRow`]s whose fields are
//! [`Cell`]s. Decoding a row interprets the cells (date parsing, number
//! parsing, metadata JSON, write timestamps) and yields a [`SignalRaw`]; it does not apply the
//! semantic checks in [`SignalRaw::validate`].

use crate::error::ValidationError;
use crate::signal::{Metadata, SignalRaw};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

/// Date formats accepted for `asof_date` text, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Date-time formats accepted for `asof_date` text; only the date is kept.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A single loosely typed value from a tabular source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// Null or absent.
    #[default]
    Null,
    /// Text, as read from CSV or a string column.
    Text(String),
    /// Floating point number.
    Float(f64),
    /// Integer.
    Int(i64),
    /// Calendar date.
    Date(NaiveDate),
    /// Timestamp without zone.
    DateTime(NaiveDateTime),
    /// Structured JSON.
    Json(serde_json::Value),
}

impl Cell {
    /// Whether the cell holds no value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<serde_json::Value> for Cell {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One candidate row with the signal columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSignalRow {
    /// `asof_date` column.
    pub asof_date: Cell,
    /// `ticker` column.
    pub ticker: Cell,
    /// `signal_name` column.
    pub signal_name: Cell,
    /// `value` column.
    pub value: Cell,
    /// `metadata` column, null when the source has none.
    pub metadata: Cell,
    /// `created_at` column, null when the source has none.
    pub created_at: Cell,
}

impl RawSignalRow {
    /// Create a row from its four required cells.
    pub fn new(
        asof_date: impl Into<Cell>,
        ticker: impl Into<Cell>,
        signal_name: impl Into<Cell>,
        value: impl Into<Cell>,
    ) -> Self {
        Self {
            asof_date: asof_date.into(),
            ticker: ticker.into(),
            signal_name: signal_name.into(),
            value: value.into(),
            metadata: Cell::Null,
            created_at: Cell::Null,
        }
    }

    /// Attach a metadata cell.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<Cell>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Attach a write-timestamp cell.
    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<Cell>) -> Self {
        self.created_at = created_at.into();
        self
    }

    /// Interpret the cells as a [`SignalRaw`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a required cell is null, the date or
    /// value cannot be read, the metadata is not a JSON object, or a present
    /// `created_at` is not a timestamp.
    pub fn decode(&self) -> Result<SignalRaw, ValidationError> {
        Ok(SignalRaw {
            asof_date: decode_date(&self.asof_date)?,
            ticker: decode_text(&self.ticker, "ticker")?,
            signal_name: decode_text(&self.signal_name, "signal_name")?,
            value: decode_value(&self.value)?,
            metadata: decode_metadata(&self.metadata)?,
            created_at: decode_timestamp(&self.created_at)?,
        })
    }
}

impl From<SignalRaw> for RawSignalRow {
    fn from(signal: SignalRaw) -> Self {
        Self {
            asof_date: Cell::Date(signal.asof_date),
            ticker: Cell::Text(signal.ticker),
            signal_name: Cell::Text(signal.signal_name),
            value: Cell::Float(signal.value),
            metadata: signal
                .metadata
                .map_or(Cell::Null, |m| Cell::Json(serde_json::Value::Object(m))),
            created_at: signal
                .created_at
                .map_or(Cell::Null, |at| Cell::DateTime(at.naive_utc())),
        }
    }
}

fn decode_date(cell: &Cell) -> Result<NaiveDate, ValidationError> {
    match cell {
        Cell::Null => Err(ValidationError::MissingField("asof_date")),
        Cell::Date(d) => Ok(*d),
        Cell::DateTime(dt) => Ok(dt.date()),
        Cell::Text(s) => parse_date_text(s),
        Cell::Json(serde_json::Value::String(s)) => parse_date_text(s),
        other => Err(ValidationError::InvalidDate(other.to_string())),
    }
}

fn parse_date_text(text: &str) -> Result<NaiveDate, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::MissingField("asof_date"));
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .ok_or_else(|| ValidationError::InvalidDate(text.to_string()))
}

/// Zone-less timestamps are read as UTC; a bare date means midnight.
fn decode_timestamp(cell: &Cell) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match cell {
        Cell::Null => Ok(None),
        Cell::DateTime(dt) => Ok(Some(dt.and_utc())),
        Cell::Date(d) => Ok(Some(d.and_time(chrono::NaiveTime::MIN).and_utc())),
        Cell::Text(s) | Cell::Json(serde_json::Value::String(s)) => parse_timestamp_text(s),
        other => Err(ValidationError::InvalidTimestamp(other.to_string())),
    }
}

fn parse_timestamp_text(text: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        })
        .map(Some)
        .ok_or_else(|| ValidationError::InvalidTimestamp(text.to_string()))
}

fn decode_text(cell: &Cell, field: &'static str) -> Result<String, ValidationError> {
    match cell {
        Cell::Null => Err(ValidationError::MissingField(field)),
        Cell::Text(s) => Ok(s.clone()),
        Cell::Json(serde_json::Value::String(s)) => Ok(s.clone()),
        Cell::Int(v) => Ok(v.to_string()),
        other => Err(ValidationError::NotText {
            field,
            found: other.to_string(),
        }),
    }
}

fn decode_value(cell: &Cell) -> Result<f64, ValidationError> {
    match cell {
        Cell::Null => Err(ValidationError::MissingField("value")),
        Cell::Float(v) => Ok(*v),
        Cell::Int(v) => Ok(*v as f64),
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(ValidationError::MissingField("value"));
            }
            s.parse::<f64>()
                .map_err(|_| ValidationError::InvalidValue(s.to_string()))
        }
        Cell::Json(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ValidationError::InvalidValue(n.to_string())),
        other => Err(ValidationError::InvalidValue(other.to_string())),
    }
}

fn decode_metadata(cell: &Cell) -> Result<Option<Metadata>, ValidationError> {
    let value = match cell {
        Cell::Null => return Ok(None),
        Cell::Text(s) if s.trim().is_empty() => return Ok(None),
        Cell::Text(s) => serde_json::from_str::<serde_json::Value>(s.trim())
            .map_err(|e| ValidationError::InvalidMetadata(e.to_string()))?,
        Cell::Json(v) => v.clone(),
        other => return Err(ValidationError::InvalidMetadata(other.to_string())),
    };

    match value {
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::Null => Ok(None),
        other => Err(ValidationError::InvalidMetadata(other.to_string())),
    }
}
