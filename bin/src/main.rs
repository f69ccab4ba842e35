//! ac-core CLI binary.
//!
//! Operator commands for the signal table: create it, check the connection,
//! insert signals one at a time or from CSV, and read them back.

mod args;
mod cmd;
mod logging;

use ac_core::SignalInserter;
use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "ac-core")]
#[command(about = "Validate and upsert raw signals into PostgreSQL", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the signal table and indexes if absent
    Init,

    /// Check that the database is reachable
    Ping,

    /// Insert or replace one signal
    Insert {
        /// As-of date (YYYY-MM-DD)
        #[arg(short, long, value_parser = args::parse_date)]
        date: NaiveDate,

        /// Ticker symbol
        #[arg(short, long)]
        ticker: String,

        /// Signal name
        #[arg(short, long)]
        signal: String,

        /// Signal value
        #[arg(short, long, allow_negative_numbers = true)]
        value: f64,

        /// Metadata as a JSON object
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Insert or replace signals from a CSV file
    InsertCsv {
        /// CSV file with asof_date, ticker, signal_name, value[, metadata]
        path: PathBuf,

        /// Rows per transaction
        #[arg(short, long, default_value_t = ac_core::DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Skip validation of ticker, signal name and value
        #[arg(long)]
        no_validate: bool,

        /// Field delimiter (a single character, or "tab")
        #[arg(short, long, default_value = ",", value_parser = args::parse_delimiter)]
        delimiter: u8,
    },

    /// Show stored signals
    Query {
        /// Ticker symbols
        #[arg(short, long, value_delimiter = ',')]
        tickers: Vec<String>,

        /// Signal names
        #[arg(short, long, value_delimiter = ',')]
        signals: Vec<String>,

        /// Start date (YYYY-MM-DD), inclusive
        #[arg(long, value_parser = args::parse_date)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD), inclusive
        #[arg(long, value_parser = args::parse_date)]
        end: Option<NaiveDate>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut inserter = SignalInserter::from_env()?;
    tracing::debug!(database = %inserter.store().config().redacted_target(), "Using database");

    let result = match cli.command {
        Commands::Init => cmd::init::init_table(&mut inserter).await,
        Commands::Ping => cmd::ping::ping(&mut inserter).await,
        Commands::Insert {
            date,
            ticker,
            signal,
            value,
            metadata,
        } => {
            cmd::insert::insert_signal(&mut inserter, date, ticker, signal, value, metadata).await
        }
        Commands::InsertCsv {
            path,
            batch_size,
            no_validate,
            delimiter,
        } => {
            cmd::insert_csv::insert_csv(&mut inserter, &path, batch_size, !no_validate, delimiter)
                .await
        }
        Commands::Query {
            tickers,
            signals,
            start,
            end,
            format,
        } => cmd::query::show_signals(&mut inserter, tickers, signals, start, end, format).await,
    };

    inserter.close().await;
    result
}
