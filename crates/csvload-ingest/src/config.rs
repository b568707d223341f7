//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/csvload";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default directory scanned for CSV files.
pub const DEFAULT_CSV_DIR: &str = "./data";

/// Default staging table name.
pub const DEFAULT_STAGING_TABLE: &str = "import_staging";

/// Default destination table name.
pub const DEFAULT_DESTINATION_TABLE: &str = "import_destination";

/// Default error audit table name.
pub const DEFAULT_ERROR_TABLE: &str = "import_errors";

/// Default success audit table name.
pub const DEFAULT_SUCCESS_TABLE: &str = "import_success_log";

/// Default rows per staging batch.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub process: ProcessConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Import pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub csv_dir: PathBuf,
    pub staging_table: String,
    pub destination_table: String,
    pub error_table: String,
    pub success_table: String,
    pub batch_size: usize,
    /// Per-operation timeout for bulk loads and the mapped transfer.
    /// `None` leaves them unbounded.
    pub bulk_timeout_secs: Option<u64>,
}

impl ProcessConfig {
    pub fn bulk_timeout(&self) -> Option<Duration> {
        self.bulk_timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = AppConfig {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            process: ProcessConfig {
                csv_dir: std::env::var("CSVLOAD_CSV_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_CSV_DIR)),
                staging_table: std::env::var("CSVLOAD_STAGING_TABLE")
                    .unwrap_or_else(|_| DEFAULT_STAGING_TABLE.to_string()),
                destination_table: std::env::var("CSVLOAD_DESTINATION_TABLE")
                    .unwrap_or_else(|_| DEFAULT_DESTINATION_TABLE.to_string()),
                error_table: std::env::var("CSVLOAD_ERROR_TABLE")
                    .unwrap_or_else(|_| DEFAULT_ERROR_TABLE.to_string()),
                success_table: std::env::var("CSVLOAD_SUCCESS_TABLE")
                    .unwrap_or_else(|_| DEFAULT_SUCCESS_TABLE.to_string()),
                batch_size: std::env::var("CSVLOAD_BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_BATCH_SIZE),
                bulk_timeout_secs: std::env::var("CSVLOAD_BULK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok()),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.process.batch_size == 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        for (label, table) in [
            ("staging", &self.process.staging_table),
            ("destination", &self.process.destination_table),
            ("error", &self.process.error_table),
            ("success", &self.process.success_table),
        ] {
            if !is_valid_identifier(table) {
                anyhow::bail!("Invalid {} table name: '{}'", label, table);
            }
        }

        if self.process.staging_table == self.process.destination_table {
            anyhow::bail!("Staging and destination tables must differ");
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            process: ProcessConfig {
                csv_dir: PathBuf::from(DEFAULT_CSV_DIR),
                staging_table: DEFAULT_STAGING_TABLE.to_string(),
                destination_table: DEFAULT_DESTINATION_TABLE.to_string(),
                error_table: DEFAULT_ERROR_TABLE.to_string(),
                success_table: DEFAULT_SUCCESS_TABLE.to_string(),
                batch_size: DEFAULT_BATCH_SIZE,
                bulk_timeout_secs: None,
            },
        }
    }
}

/// Plain SQL identifier: ASCII letter or underscore, then letters, digits,
/// underscores.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = AppConfig::default();
        config.process.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_connections_cannot_exceed_max() {
        let mut config = AppConfig::default();
        config.database.min_connections = 20;
        config.database.max_connections = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_names_must_be_identifiers() {
        let mut config = AppConfig::default();
        config.process.staging_table = "stage; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        config.process.staging_table = "1table".to_string();
        assert!(config.validate().is_err());

        config.process.staging_table = "_stage_2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_staging_and_destination_must_differ() {
        let mut config = AppConfig::default();
        config.process.destination_table = config.process.staging_table.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bulk_timeout_conversion() {
        let mut config = AppConfig::default();
        assert_eq!(config.process.bulk_timeout(), None);
        config.process.bulk_timeout_secs = Some(30);
        assert_eq!(config.process.bulk_timeout(), Some(Duration::from_secs(30)));
    }
}
