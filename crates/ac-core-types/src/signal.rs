//! The raw signal record and its natural key.
//!
//! A [`SignalRaw`] is one observation of a named signal for one ticker on one
//! date. Records are built transiently from caller input, validated in memory,
//! and written by upsert on their [`SignalKey`].

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Auxiliary attributes attached to a signal, stored as JSON.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One signal observation.
///
/// # Example
///
/// ```
/// use ac_core_types::SignalRaw;
/// use chrono::NaiveDate;
///
/// let signal = SignalRaw::new(
///     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
///     "AAPL",
///     "SENTIMENT_YT",
///     0.75,
///     None,
/// )
/// .unwrap();
/// assert_eq!(signal.ticker, "AAPL");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRaw {
    /// Calendar date the signal applies to.
    pub asof_date: NaiveDate,
    /// Instrument identifier, e.g. `AAPL`.
    pub ticker: String,
    /// Signal type identifier, e.g. `SENTIMENT_YT`.
    pub signal_name: String,
    /// The observed value.
    pub value: f64,
    /// Optional auxiliary attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Write timestamp to store; storage uses its own clock when `None`.
    /// Read-back reports the stored timestamp in [`StoredSignal::created_at`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SignalRaw {
    /// Build a validated signal record.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the ticker or signal name is blank or
    /// the value is not finite.
    pub fn new(
        asof_date: NaiveDate,
        ticker: impl Into<String>,
        signal_name: impl Into<String>,
        value: f64,
        metadata: Option<Metadata>,
    ) -> Result<Self, ValidationError> {
        let signal = Self {
            asof_date,
            ticker: ticker.into(),
            signal_name: signal_name.into(),
            value,
            metadata,
            created_at: None,
        };
        signal.validate()?;
        Ok(signal)
    }

    /// Record an explicit write timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Check the record against the signal rules without touching storage.
    ///
    /// # Errors
    ///
    /// Returns the first rule the record breaks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ticker.trim().is_empty() {
            return Err(ValidationError::EmptyTicker);
        }
        if self.signal_name.trim().is_empty() {
            return Err(ValidationError::EmptySignalName);
        }
        if !self.value.is_finite() {
            return Err(ValidationError::NonFiniteValue(self.value));
        }
        Ok(())
    }

    /// The natural key this record is upserted on.
    #[must_use]
    pub fn key(&self) -> SignalKey {
        SignalKey {
            asof_date: self.asof_date,
            ticker: self.ticker.clone(),
            signal_name: self.signal_name.clone(),
        }
    }

    /// Serialize the metadata to JSON text, if any.
    #[must_use]
    pub fn metadata_json(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .map(|m| serde_json::Value::Object(m.clone()).to_string())
    }
}

/// Natural key of a signal: `(asof_date, ticker, signal_name)`.
///
/// Ordering is by date, then ticker, then signal name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalKey {
    /// Calendar date.
    pub asof_date: NaiveDate,
    /// Instrument identifier.
    pub ticker: String,
    /// Signal type identifier.
    pub signal_name: String,
}

/// A signal as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSignal {
    /// Surrogate row id assigned by storage.
    pub id: i64,
    /// The stored observation.
    #[serde(flatten)]
    pub signal: SignalRaw,
    /// When the row was last written.
    pub created_at: DateTime<Utc>,
}
