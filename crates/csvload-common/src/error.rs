//! Error types for csvload

use thiserror::Error;

/// Result type alias for csvload operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Main error type for the csvload pipeline
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV file '{0}' is empty or has no header row")]
    EmptyHeader(String),

    #[error("No matching columns found between staging table '{staging}' and destination table '{destination}'")]
    NoMatchingColumns {
        staging: String,
        destination: String,
    },

    #[error("Data transfer mismatch: staging table had {staged} rows, but {transferred} rows were transferred to destination")]
    CountMismatch { staged: i64, transferred: i64 },

    #[error("Unknown table '{0}' in store")]
    UnknownTable(String),

    #[error("Column set mismatch loading into '{table}': {reason}")]
    ColumnMismatch { table: String, reason: String },

    #[error("Bulk operation timed out after {0:.2} s")]
    Timeout(f64),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoadError {
    /// Short machine-readable label for the error category, used as the
    /// `error_type` field of error audit records.
    pub fn error_type(&self) -> &'static str {
        match self {
            LoadError::Io(_) => "IoError",
            LoadError::Database(_) => "DatabaseError",
            LoadError::EmptyHeader(_) => "CsvParsingError",
            LoadError::NoMatchingColumns { .. } => "ColumnMappingError",
            LoadError::CountMismatch { .. } => "ReconciliationError",
            LoadError::UnknownTable(_) => "DatabaseError",
            LoadError::ColumnMismatch { .. } => "DatabaseError",
            LoadError::Timeout(_) => "TimeoutError",
            LoadError::Config(_) => "ConfigError",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LoadError::CountMismatch {
            staged: 100,
            transferred: 98,
        };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("98"));
        assert!(msg.contains("mismatch"));
    }

    #[test]
    fn test_error_type_labels() {
        assert_eq!(
            LoadError::EmptyHeader("a.csv".into()).error_type(),
            "CsvParsingError"
        );
        assert_eq!(
            LoadError::CountMismatch {
                staged: 1,
                transferred: 0
            }
            .error_type(),
            "ReconciliationError"
        );
    }
}
