//! Staging loader
//!
//! Pushes one batch into the staging table through the store's bulk-load
//! primitive, each batch column mapped to the identically named staging
//! column. The staging schema must already exist (the orchestrator creates
//! it from the first batch's column set); a column-set mismatch or any
//! driver failure propagates and is fatal for the file.

use std::time::Instant;

use csvload_common::Result;
use tracing::info;

use crate::csv::batch::Batch;
use crate::store::{BulkLoadOptions, StoreSession};

/// Bulk-load `batch` into `staging_table`, consuming the batch.
///
/// Returns the number of rows the driver reports loaded.
pub async fn load_batch<S: StoreSession>(
    session: &mut S,
    staging_table: &str,
    batch: Batch,
    options: &BulkLoadOptions,
) -> Result<u64> {
    let started = Instant::now();
    info!(
        table = %staging_table,
        rows = batch.len(),
        "Starting bulk load into staging table"
    );

    let columns = batch.columns().to_vec();
    let loaded = session
        .bulk_load(staging_table, &columns, batch.into_rows(), options)
        .await?;

    info!(
        table = %staging_table,
        rows = loaded,
        elapsed_s = format!("{:.2}", started.elapsed().as_secs_f64()),
        "Staging load completed"
    );
    Ok(loaded)
}
