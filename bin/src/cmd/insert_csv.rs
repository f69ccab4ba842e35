//! Insert-csv command implementation.

use ac_core::types::CsvTable;
use ac_core::{CsvOptions, InsertOptions, InsertSummary, SignalInserter};
use anyhow::{Result, bail};
use std::path::Path;

/// Upsert every row of a CSV file and report what was not written.
pub(crate) async fn insert_csv(
    inserter: &mut SignalInserter,
    path: &Path,
    batch_size: usize,
    validate: bool,
    delimiter: u8,
) -> Result<()> {
    let options = InsertOptions::default()
        .with_batch_size(batch_size)
        .with_validation(validate);
    let csv = CsvOptions::default().with_delimiter(delimiter);

    let table = CsvTable::from_path(path, &csv)?;
    let summary = inserter.insert_from_source(&table, options).await?;
    print_summary(&summary, &table);

    if !summary.is_success() {
        bail!(
            "{} of {} rows were not written",
            summary.attempted - summary.written(),
            summary.attempted
        );
    }
    Ok(())
}

fn print_summary(summary: &InsertSummary, table: &CsvTable) {
    println!("{summary}");
    for warning in &summary.warnings {
        println!("  warning: {warning}");
    }
    for (row, reason) in &summary.rejected {
        match table.line(*row) {
            Some(line) => println!("  line {line}: {reason}"),
            None => println!("  row {row}: {reason}"),
        }
    }
    for failure in &summary.failed_batches {
        println!(
            "  batch {} rolled back ({} rows): {}",
            failure.batch,
            failure.rows.len(),
            failure.reason
        );
    }
}
