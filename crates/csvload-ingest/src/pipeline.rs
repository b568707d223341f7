//! Per-file import pipeline
//!
//! Drives one CSV file end to end: pull batches from the producer, recreate
//! the staging table from the first batch's header, bulk-load every batch,
//! and hand the last batch's signal to the transfer engine. Row-level
//! errors collected by the producer are flushed to the audit sink after
//! every pull so they are durable even when a later step fails.

use std::path::Path;
use std::time::{Duration, Instant};

use csvload_common::Result;
use tracing::{info, warn};

use crate::audit::{AuditSink, ErrorRecord, SuccessRecord};
use crate::config::ProcessConfig;
use crate::csv::CsvBatchProducer;
use crate::staging;
use crate::store::{BulkLoadOptions, TransferStore};
use crate::transfer::{transfer_file, TransferPlan, TransferReport};

/// Summary of one processed file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub file_label: String,
    /// Valid data rows staged (structurally bad rows are excluded).
    pub total_rows: u64,
    pub columns: usize,
    pub batches: u64,
    pub elapsed: Duration,
    /// `None` when the file produced no batches.
    pub transfer: Option<TransferReport>,
}

/// Process a single CSV file through staging and transfer.
pub async fn process_file<S, A>(
    store: &mut S,
    audit: &A,
    path: &Path,
    config: &ProcessConfig,
    is_first_file: bool,
) -> Result<FileReport>
where
    S: TransferStore,
    A: AuditSink,
{
    let started = Instant::now();
    let mut producer = CsvBatchProducer::open(path, config.batch_size)?;
    let file_label = producer.file_label().to_string();
    let columns = producer.columns().to_vec();

    info!(
        file = %file_label,
        columns = columns.len(),
        batch_size = config.batch_size,
        "Processing file"
    );

    let options = BulkLoadOptions {
        batch_size: config.batch_size,
        timeout: config.bulk_timeout(),
    };

    let mut total_rows = 0u64;
    let mut batches = 0u64;
    let mut transfer = None;
    let mut sink: Vec<ErrorRecord> = Vec::new();

    loop {
        let next = producer.next_batch(&mut sink);
        for record in sink.drain(..) {
            warn!(file = %record.file_name, reason = %record.reason, "Dropped row");
            audit.error(&record).await?;
        }
        let Some(batch) = next? else { break };

        if batch.is_first {
            store
                .recreate_table(&config.staging_table, batch.columns())
                .await?;
        }

        let is_last = batch.is_last;
        total_rows += batch.len() as u64;
        batches += 1;
        staging::load_batch(store, &config.staging_table, batch, &options).await?;

        if is_last {
            let plan = TransferPlan {
                staging_table: config.staging_table.clone(),
                destination_table: config.destination_table.clone(),
                is_first_file,
                file_label: file_label.clone(),
                options: options.clone(),
            };
            transfer = Some(transfer_file(store, audit, &plan).await?);
        }
    }

    let elapsed = started.elapsed();
    audit
        .success(&SuccessRecord::file_processed(
            &file_label,
            total_rows,
            columns.len(),
            elapsed,
        ))
        .await?;
    info!(
        file = %file_label,
        rows = total_rows,
        batches,
        elapsed_s = format!("{:.2}", elapsed.as_secs_f64()),
        "File processed"
    );

    Ok(FileReport {
        file_label,
        total_rows,
        columns: columns.len(),
        batches,
        elapsed,
        transfer,
    })
}
