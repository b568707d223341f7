//! Durable audit logging
//!
//! Two append-only writers over the configured error and success tables.
//! Each writer ensures its table exists before first use (create-if-absent,
//! never altering an existing schema) and performs one INSERT per record.
//! Write failures propagate: a lost audit record is a correctness problem
//! for the systems consuming the trail, so nothing here is swallowed.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use csvload_common::{LoadError, Result};

use crate::config::ProcessConfig;
use crate::store::quote_ident;

/// One failure entry: which file, which stage, what kind, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub file_name: String,
    /// Column name or stage label ("Row Structure", "Process", ...).
    pub column_name: String,
    pub error_type: String,
    pub reason: String,
}

impl ErrorRecord {
    /// A data row whose field count did not match the header.
    pub fn row_structure(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            column_name: "Row Structure".to_string(),
            error_type: "CSV Parsing Error".to_string(),
            reason: format!("Row length mismatch in file {file_name}"),
        }
    }

    /// A file that failed outside the row loop (open, header, staging, ...).
    pub fn file_processing(file_name: &str, reason: impl Into<String>) -> Self {
        Self {
            file_name: file_name.to_string(),
            column_name: "File Processing".to_string(),
            error_type: "ProcessError".to_string(),
            reason: reason.into(),
        }
    }

    /// A transfer that was rolled back.
    pub fn transfer_failure(file_name: &str, error: &LoadError) -> Self {
        Self {
            file_name: file_name.to_string(),
            column_name: "Process".to_string(),
            error_type: error.error_type().to_string(),
            reason: error.to_string(),
        }
    }
}

/// One success entry; the message embeds row/column/timing/throughput text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessRecord {
    pub message: String,
}

impl SuccessRecord {
    /// Record a committed staging-to-destination transfer.
    pub fn transfer(file_name: &str, rows: i64, columns: usize, elapsed: Duration) -> Self {
        let seconds = elapsed.as_secs_f64();
        let rate = if seconds > 0.0 {
            rows as f64 / seconds
        } else {
            rows as f64
        };
        Self {
            message: format!(
                "Successfully transferred data from {file_name} - Rows: {rows}, Columns: {columns}, Time: {seconds:.2} s, Rate: {rate:.0} rows/sec"
            ),
        }
    }

    /// Record a fully processed file.
    pub fn file_processed(file_name: &str, rows: u64, columns: usize, elapsed: Duration) -> Self {
        let seconds = elapsed.as_secs_f64();
        Self {
            message: format!(
                "Successfully processed file: {file_name} - Rows: {rows}, Columns: {columns}, Time: {seconds:.2} s"
            ),
        }
    }
}

/// Append-only destination for audit records.
#[async_trait]
pub trait AuditSink {
    async fn error(&self, record: &ErrorRecord) -> Result<()>;
    async fn success(&self, record: &SuccessRecord) -> Result<()>;
}

/// PostgreSQL-backed audit log.
pub struct AuditLog {
    pool: PgPool,
    error_table: String,
    success_table: String,
}

impl AuditLog {
    pub fn new(pool: PgPool, config: &ProcessConfig) -> Self {
        Self {
            pool,
            error_table: config.error_table.clone(),
            success_table: config.success_table.clone(),
        }
    }

    /// Idempotently create both audit tables. Existing tables are left
    /// untouched.
    pub async fn ensure_tables(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                file_name TEXT,
                column_name TEXT,
                error_type TEXT,
                reason TEXT,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            quote_ident(&self.error_table)
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                message TEXT,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            quote_ident(&self.success_table)
        ))
        .execute(&self.pool)
        .await?;

        debug!(
            error_table = %self.error_table,
            success_table = %self.success_table,
            "Audit tables ready"
        );
        Ok(())
    }
}

#[async_trait]
impl AuditSink for AuditLog {
    async fn error(&self, record: &ErrorRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} (file_name, column_name, error_type, reason) VALUES ($1, $2, $3, $4)",
            quote_ident(&self.error_table)
        ))
        .bind(&record.file_name)
        .bind(&record.column_name)
        .bind(&record.error_type)
        .bind(&record.reason)
        .execute(&self.pool)
        .await?;

        debug!(file = %record.file_name, error_type = %record.error_type, "Wrote error audit record");
        Ok(())
    }

    async fn success(&self, record: &SuccessRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} (message) VALUES ($1)",
            quote_ident(&self.success_table)
        ))
        .bind(&record.message)
        .execute(&self.pool)
        .await?;

        debug!("Wrote success audit record");
        Ok(())
    }
}

/// In-memory audit sink for the test suite.
#[derive(Default)]
pub struct MemoryAudit {
    errors: Mutex<Vec<ErrorRecord>>,
    successes: Mutex<Vec<SuccessRecord>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn successes(&self) -> Vec<SuccessRecord> {
        self.successes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAudit {
    async fn error(&self, record: &ErrorRecord) -> Result<()> {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn success(&self, record: &SuccessRecord) -> Result<()> {
        self.successes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
