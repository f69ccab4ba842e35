//! Init command implementation.

use ac_core::{SignalInserter, SignalStore, db::schema::TABLE_NAME};
use anyhow::Result;

/// Create the signal table and its indexes if they do not exist.
pub(crate) async fn init_table(inserter: &mut SignalInserter) -> Result<()> {
    inserter.store_mut().ensure_table().await?;
    println!("Table {TABLE_NAME} is ready");
    Ok(())
}
