//! Transactional transfer engine
//!
//! Runs once per file, triggered by the last batch: inside one transaction
//! the staged rows are copied into the destination through the computed
//! column mapping, and the destination's row-count delta is reconciled
//! against the staging count before committing. Any failure rolls the
//! whole transaction back (including a first-file truncate), writes an
//! error audit record, and surfaces the error so the orchestrator can
//! decide whether to carry on with the next file.
//!
//! The count reconciliation catches silent partial writes inside the bulk
//! primitive that would otherwise go unnoticed.

use std::time::{Duration, Instant};

use csvload_common::{LoadError, Result};
use tracing::{error, info};

use crate::audit::{AuditSink, ErrorRecord, SuccessRecord};
use crate::store::{BulkLoadOptions, ColumnMapping, StoreSession, StoreTransaction, TransferStore};

/// Everything the engine needs to move one file's staged rows.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub staging_table: String,
    pub destination_table: String,
    /// First file of the run: the destination is truncated before copying.
    pub is_first_file: bool,
    /// File name used in audit records and log lines.
    pub file_label: String,
    pub options: BulkLoadOptions,
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Rows verified to have reached the destination.
    pub rows: i64,
    /// Mapped column count.
    pub columns: usize,
    pub elapsed: Duration,
}

/// Execute the transfer protocol for one file.
pub async fn transfer_file<S, A>(store: &mut S, audit: &A, plan: &TransferPlan) -> Result<TransferReport>
where
    S: TransferStore,
    A: AuditSink,
{
    info!(
        file = %plan.file_label,
        staging = %plan.staging_table,
        destination = %plan.destination_table,
        "Starting transfer to destination"
    );
    let started = Instant::now();
    let mut tx = store.begin().await?;

    let outcome = match run_protocol(&mut tx, plan).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Rollback failed");
            }
            audit
                .error(&ErrorRecord::transfer_failure(&plan.file_label, &err))
                .await?;
            error!(file = %plan.file_label, error = %err, "Transfer rolled back");
            return Err(err);
        },
    };

    if let Err(err) = tx.commit().await {
        audit
            .error(&ErrorRecord::transfer_failure(&plan.file_label, &err))
            .await?;
        error!(file = %plan.file_label, error = %err, "Commit failed");
        return Err(err);
    }

    let elapsed = started.elapsed();
    audit
        .success(&SuccessRecord::transfer(
            &plan.file_label,
            outcome.rows,
            outcome.columns,
            elapsed,
        ))
        .await?;
    info!(
        file = %plan.file_label,
        rows = outcome.rows,
        columns = outcome.columns,
        elapsed_s = format!("{:.2}", elapsed.as_secs_f64()),
        "Transfer committed"
    );

    Ok(TransferReport {
        rows: outcome.rows,
        columns: outcome.columns,
        elapsed,
    })
}

struct TransferOutcome {
    rows: i64,
    columns: usize,
}

/// Steps 1-7 of the protocol, all scoped to the open transaction.
async fn run_protocol<T: StoreSession>(tx: &mut T, plan: &TransferPlan) -> Result<TransferOutcome> {
    let mut initial_count = tx.row_count(&plan.destination_table).await?;

    if plan.is_first_file {
        tx.truncate(&plan.destination_table).await?;
        initial_count = 0;
    }

    let staging_columns = tx.table_columns(&plan.staging_table).await?;
    let destination_columns = tx.table_columns(&plan.destination_table).await?;
    let mapping = ColumnMapping::matching(&staging_columns, &destination_columns);
    if mapping.is_empty() {
        return Err(LoadError::NoMatchingColumns {
            staging: plan.staging_table.clone(),
            destination: plan.destination_table.clone(),
        });
    }

    let staged_count = tx.row_count(&plan.staging_table).await?;

    tx.copy_mapped(
        &plan.staging_table,
        &plan.destination_table,
        &mapping,
        &plan.options,
    )
    .await?;

    let final_count = tx.row_count(&plan.destination_table).await?;
    let transferred = final_count - initial_count;

    if transferred != staged_count {
        return Err(LoadError::CountMismatch {
            staged: staged_count,
            transferred,
        });
    }

    Ok(TransferOutcome {
        rows: transferred,
        columns: mapping.len(),
    })
}
