//! csvload - CSV batch import tool

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use csvload_common::logging::{init_logging, LogConfig, LogLevel};
use csvload_ingest::audit::{AuditLog, AuditSink, ErrorRecord};
use csvload_ingest::config::AppConfig;
use csvload_ingest::pipeline::process_file;
use csvload_ingest::store::postgres::PgStore;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "csvload")]
#[command(author, version, about = "Batch-import CSV files into PostgreSQL")]
struct Cli {
    /// Directory containing the CSV files to import
    #[arg(short, long)]
    csv_dir: Option<PathBuf>,

    /// Rows per staging batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Keep existing destination rows instead of truncating before the
    /// first file
    #[arg(long)]
    no_truncate: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    log_config.log_file_prefix = "csvload".to_string();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let mut config = AppConfig::load()?;
    if let Some(csv_dir) = cli.csv_dir {
        config.process.csv_dir = csv_dir;
    }
    if let Some(batch_size) = cli.batch_size {
        config.process.batch_size = batch_size;
    }
    config.validate()?;

    let files = csv_files(&config.process.csv_dir)?;
    if files.is_empty() {
        anyhow::bail!(
            "No CSV files found in {}",
            config.process.csv_dir.display()
        );
    }
    info!(
        dir = %config.process.csv_dir.display(),
        files = files.len(),
        "Starting import run"
    );

    let mut store = PgStore::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let version = store.ping().await.context("Database ping failed")?;
    info!(server = %version, "Connected to database");

    let audit = AuditLog::new(store.pool().clone(), &config.process);
    audit
        .ensure_tables()
        .await
        .context("Failed to prepare audit tables")?;

    let mut processed = 0usize;
    let mut failed = 0usize;
    for (index, path) in files.iter().enumerate() {
        let is_first_file = index == 0 && !cli.no_truncate;
        match process_file(&mut store, &audit, path, &config.process, is_first_file).await {
            Ok(report) => {
                processed += 1;
                info!(
                    file = %report.file_label,
                    rows = report.total_rows,
                    "File imported"
                );
            },
            Err(err) => {
                failed += 1;
                let label = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                error!(file = %label, error = %err, "File failed");
                audit
                    .error(&ErrorRecord::file_processing(&label, err.to_string()))
                    .await
                    .context("Failed to write audit record")?;
            },
        }
    }

    info!(processed, failed, "Import run complete");
    Ok(())
}

/// CSV files in `dir`, sorted by name for a deterministic first file.
fn csv_files(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}
