//! Query command implementation.

use crate::OutputFormat;
use ac_core::{SignalInserter, SignalQuery, StoredSignal};
use anyhow::Result;
use chrono::NaiveDate;

/// Print stored signals matching the filters.
pub(crate) async fn show_signals(
    inserter: &mut SignalInserter,
    tickers: Vec<String>,
    signals: Vec<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    format: OutputFormat,
) -> Result<()> {
    let mut query = SignalQuery::new()
        .with_tickers(tickers)
        .with_signal_names(signals);
    query.start_date = start;
    query.end_date = end;

    let stored = inserter.get_existing_signals(&query).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stored)?),
        OutputFormat::Text => print_table(&stored),
    }
    Ok(())
}

fn print_table(stored: &[StoredSignal]) {
    if stored.is_empty() {
        println!("No signals found");
        return;
    }

    println!(
        "{:<12} {:<10} {:<24} {:>14}  METADATA",
        "ASOF_DATE", "TICKER", "SIGNAL_NAME", "VALUE"
    );
    println!("{}", "-".repeat(72));
    for s in stored {
        println!(
            "{:<12} {:<10} {:<24} {:>14.6}  {}",
            s.signal.asof_date,
            s.signal.ticker,
            s.signal.signal_name,
            s.signal.value,
            s.signal.metadata_json().unwrap_or_default()
        );
    }
    println!("\n{} signal(s)", stored.len());
}
