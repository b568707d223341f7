//! Store abstraction
//!
//! Narrow async interfaces over the relational store so the pipeline logic
//! runs unchanged against PostgreSQL ([`postgres::PgStore`]) or the
//! in-memory fake ([`memory::MemoryStore`]) used by the test suite. The
//! bulk-load primitive and transaction objects stay opaque behind these
//! traits; the pipeline only sees row counts, column lists and copy calls.

pub mod memory;
pub mod postgres;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use csvload_common::Result;

use crate::csv::batch::Row;

/// Options handed to the bulk-load primitive.
///
/// `timeout: None` means unbounded wait, which is the default policy for
/// the network-bound bulk calls; a bound is opt-in configuration rather
/// than a hidden driver default.
#[derive(Debug, Clone)]
pub struct BulkLoadOptions {
    /// Driver-level batch hint for the bulk primitive.
    pub batch_size: usize,
    /// Upper bound on one bulk operation, `None` for unbounded.
    pub timeout: Option<Duration>,
}

impl Default for BulkLoadOptions {
    fn default() -> Self {
        Self {
            batch_size: 100_000,
            timeout: None,
        }
    }
}

/// Ordered staging-to-destination column pairs.
///
/// Built once per transfer by intersecting the two tables' column names;
/// names must match exactly and the order follows the staging table. An
/// empty mapping aborts the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pairs: Vec<(String, String)>,
}

impl ColumnMapping {
    /// Intersect staging and destination column names (exact match,
    /// staging order).
    pub fn matching(staging: &[String], destination: &[String]) -> Self {
        let destination: HashSet<&str> = destination.iter().map(String::as_str).collect();
        let pairs = staging
            .iter()
            .filter(|column| destination.contains(column.as_str()))
            .map(|column| (column.clone(), column.clone()))
            .collect();
        Self { pairs }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Staging-side column list as quoted SQL identifiers.
    pub fn staging_sql_list(&self) -> String {
        self.pairs
            .iter()
            .map(|(staging, _)| quote_ident(staging))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Destination-side column list as quoted SQL identifiers.
    pub fn destination_sql_list(&self) -> String {
        self.pairs
            .iter()
            .map(|(_, destination)| quote_ident(destination))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Quote an SQL identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Session-scoped store operations.
///
/// Implemented both by pool-backed sessions (staging loads, DDL) and by
/// open transactions (the transfer protocol).
#[async_trait]
pub trait StoreSession: Send {
    /// Number of rows currently in `table`.
    async fn row_count(&mut self, table: &str) -> Result<i64>;

    /// Column names of `table`, in ordinal position order.
    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>>;

    /// Remove all rows from `table`.
    async fn truncate(&mut self, table: &str) -> Result<()>;

    /// Drop `table` if it exists and create it fresh with the given text
    /// columns.
    async fn recreate_table(&mut self, table: &str, columns: &[String]) -> Result<()>;

    /// Bulk-load rows into `table`, each value mapped to the identically
    /// named column. Returns the number of rows the driver reports loaded.
    async fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Row>,
        options: &BulkLoadOptions,
    ) -> Result<u64>;

    /// Stream all rows of `source` into `destination` through the column
    /// mapping. Returns the number of rows the driver reports copied; the
    /// transfer protocol re-counts rather than trusting this figure.
    async fn copy_mapped(
        &mut self,
        source: &str,
        destination: &str,
        mapping: &ColumnMapping,
        options: &BulkLoadOptions,
    ) -> Result<u64>;
}

/// An open transaction; all [`StoreSession`] operations are scoped to it
/// until committed or rolled back.
#[async_trait]
pub trait StoreTransaction: StoreSession {
    async fn commit(self) -> Result<()>;
    async fn rollback(self) -> Result<()>;
}

/// A store that can open transactions for the transfer protocol.
#[async_trait]
pub trait TransferStore: StoreSession {
    type Tx: StoreTransaction;

    async fn begin(&mut self) -> Result<Self::Tx>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mapping_intersects_in_staging_order() {
        let staging = names(&["b", "a", "c"]);
        let destination = names(&["a", "b", "x"]);
        let mapping = ColumnMapping::matching(&staging, &destination);
        assert_eq!(
            mapping.pairs(),
            &[
                ("b".to_string(), "b".to_string()),
                ("a".to_string(), "a".to_string())
            ]
        );
    }

    #[test]
    fn test_mapping_requires_exact_names() {
        let mapping = ColumnMapping::matching(&names(&["Id"]), &names(&["id"]));
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_sql_lists_are_quoted() {
        let mapping = ColumnMapping::matching(&names(&["id", "name"]), &names(&["id", "name"]));
        assert_eq!(mapping.staging_sql_list(), r#""id", "name""#);
        assert_eq!(mapping.destination_sql_list(), r#""id", "name""#);
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_default_options_are_unbounded() {
        let options = BulkLoadOptions::default();
        assert!(options.timeout.is_none());
        assert_eq!(options.batch_size, 100_000);
    }
}
