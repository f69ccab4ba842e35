//! Insert command implementation.

use ac_core::{Metadata, SignalInserter, SignalRaw};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

/// Upsert one signal given on the command line.
pub(crate) async fn insert_signal(
    inserter: &mut SignalInserter,
    date: NaiveDate,
    ticker: String,
    signal_name: String,
    value: f64,
    metadata: Option<String>,
) -> Result<()> {
    let metadata = metadata
        .map(|text| parse_metadata(&text))
        .transpose()?;
    let signal = SignalRaw::new(date, ticker, signal_name, value, metadata)?;

    if !inserter.insert_single_signal(&signal).await? {
        bail!(
            "Signal {} {} {} was not written",
            signal.asof_date,
            signal.ticker,
            signal.signal_name
        );
    }
    println!(
        "Upserted {} {} {} = {}",
        signal.asof_date, signal.ticker, signal.signal_name, signal.value
    );
    Ok(())
}

fn parse_metadata(text: &str) -> Result<Metadata> {
    serde_json::from_str(text).context("--metadata must be a JSON object")
}
