//! Read-back filter for stored signals.

use crate::signal::SignalRaw;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Filter for retrieving stored signals.
///
/// Empty lists and absent bounds do not constrain the result. Date bounds are
/// inclusive.
///
/// # Example
///
/// ```
/// use ac_core_types::SignalQuery;
/// use chrono::NaiveDate;
///
/// let query = SignalQuery::new()
///     .with_tickers(["AAPL", "MSFT"])
///     .with_signal_names(["SENTIMENT_YT"])
///     .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
/// assert!(query.end_date.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalQuery {
    /// Tickers to include.
    pub tickers: Vec<String>,
    /// Signal names to include.
    pub signal_names: Vec<String>,
    /// Earliest `asof_date` to include.
    pub start_date: Option<NaiveDate>,
    /// Latest `asof_date` to include.
    pub end_date: Option<NaiveDate>,
}

impl SignalQuery {
    /// A query matching every stored signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given tickers.
    #[must_use]
    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickers = tickers.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to the given signal names.
    #[must_use]
    pub fn with_signal_names<I, S>(mut self, signal_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signal_names = signal_names.into_iter().map(Into::into).collect();
        self
    }

    /// Inclusive lower date bound.
    #[must_use]
    pub const fn start(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Inclusive upper date bound.
    #[must_use]
    pub const fn end(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Whether a bound makes the query empty by construction.
    #[must_use]
    pub fn is_unsatisfiable(&self) -> bool {
        matches!((self.start_date, self.end_date), (Some(s), Some(e)) if s > e)
    }

    /// Whether `signal` passes this filter.
    #[must_use]
    pub fn matches(&self, signal: &SignalRaw) -> bool {
        (self.tickers.is_empty() || self.tickers.contains(&signal.ticker))
            && (self.signal_names.is_empty() || self.signal_names.contains(&signal.signal_name))
            && self.start_date.is_none_or(|d| signal.asof_date >= d)
            && self.end_date.is_none_or(|d| signal.asof_date <= d)
    }
}
