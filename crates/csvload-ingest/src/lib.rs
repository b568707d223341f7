//! csvload Ingest Library
//!
//! Streams delimited text files into PostgreSQL through a two-stage
//! transfer: batches of normalized rows are bulk-loaded into a staging
//! table, and on the final batch of each file the staged rows are moved
//! into the destination table inside one transaction with row-count
//! reconciliation. Successes and failures are recorded in durable audit
//! tables.
//!
//! # Pipeline
//!
//! ```text
//! file -> CsvBatchProducer -> load_batch (staging) -> transfer_file -> audit
//! ```
//!
//! # Example
//!
//! ```no_run
//! use csvload_ingest::config::AppConfig;
//! use csvload_ingest::pipeline;
//! use csvload_ingest::store::postgres::PgStore;
//! use csvload_ingest::audit::AuditLog;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let mut store = PgStore::connect(&config.database).await?;
//!     let audit = AuditLog::new(store.pool().clone(), &config.process);
//!     audit.ensure_tables().await?;
//!     pipeline::process_file(
//!         &mut store,
//!         &audit,
//!         std::path::Path::new("./data/accounts.csv"),
//!         &config.process,
//!         true,
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod csv;
pub mod pipeline;
pub mod staging;
pub mod store;
pub mod transfer;
