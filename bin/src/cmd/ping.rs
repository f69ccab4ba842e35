//! Ping command implementation.

use ac_core::SignalInserter;
use anyhow::{Result, bail};

/// Check the database connection.
pub(crate) async fn ping(inserter: &mut SignalInserter) -> Result<()> {
    let target = inserter.store().config().redacted_target();
    if !inserter.test_connection().await {
        bail!("Database at {target} is unreachable");
    }
    println!("Connected to {target}");
    Ok(())
}
