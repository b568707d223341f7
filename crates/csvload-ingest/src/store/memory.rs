//! In-memory store
//!
//! Test double for the store traits: tables are column lists plus row
//! vectors behind a mutex, and transactions work on a snapshot that only
//! replaces the shared state on commit. The `copy_shortfall` knob makes the
//! next mapped copy silently drop rows, which is how the test suite
//! exercises the reconciliation rollback path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use csvload_common::{LoadError, Result};

use super::{BulkLoadOptions, ColumnMapping, StoreSession, StoreTransaction, TransferStore};
use crate::csv::batch::Row;

/// One in-memory table.
#[derive(Debug, Clone, Default)]
pub struct MemTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

type Tables = HashMap<String, MemTable>;

/// Shared in-memory store state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    copy_shortfall: Arc<Mutex<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given columns and no rows.
    pub fn create_table(&self, name: &str, columns: &[&str]) {
        self.lock_tables().insert(
            name.to_string(),
            MemTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Append pre-built rows to an existing table.
    pub fn seed_rows(&self, name: &str, rows: Vec<Row>) {
        if let Some(table) = self.lock_tables().get_mut(name) {
            table.rows.extend(rows);
        }
    }

    /// Snapshot of a table, if present.
    pub fn table(&self, name: &str) -> Option<MemTable> {
        self.lock_tables().get(name).cloned()
    }

    /// Make the next mapped copy silently drop `rows` rows, simulating a
    /// bulk primitive that under-delivers without raising.
    pub fn set_copy_shortfall(&self, rows: u64) {
        *self
            .copy_shortfall
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = rows;
    }

    fn take_copy_shortfall(&self) -> u64 {
        std::mem::take(
            &mut *self
                .copy_shortfall
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    fn lock_tables(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StoreSession for MemoryStore {
    async fn row_count(&mut self, table: &str) -> Result<i64> {
        count_rows(&self.lock_tables(), table)
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        columns_of(&self.lock_tables(), table)
    }

    async fn truncate(&mut self, table: &str) -> Result<()> {
        truncate_rows(&mut self.lock_tables(), table)
    }

    async fn recreate_table(&mut self, table: &str, columns: &[String]) -> Result<()> {
        self.lock_tables().insert(
            table.to_string(),
            MemTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Row>,
        _options: &BulkLoadOptions,
    ) -> Result<u64> {
        append_rows(&mut self.lock_tables(), table, columns, rows)
    }

    async fn copy_mapped(
        &mut self,
        source: &str,
        destination: &str,
        mapping: &ColumnMapping,
        _options: &BulkLoadOptions,
    ) -> Result<u64> {
        let shortfall = self.take_copy_shortfall();
        copy_rows(&mut self.lock_tables(), source, destination, mapping, shortfall)
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&mut self) -> Result<Self::Tx> {
        let working = self.lock_tables().clone();
        Ok(MemoryTx {
            store: self.clone(),
            working,
        })
    }
}

/// Snapshot transaction over a [`MemoryStore`].
pub struct MemoryTx {
    store: MemoryStore,
    working: Tables,
}

#[async_trait]
impl StoreSession for MemoryTx {
    async fn row_count(&mut self, table: &str) -> Result<i64> {
        count_rows(&self.working, table)
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        columns_of(&self.working, table)
    }

    async fn truncate(&mut self, table: &str) -> Result<()> {
        truncate_rows(&mut self.working, table)
    }

    async fn recreate_table(&mut self, table: &str, columns: &[String]) -> Result<()> {
        self.working.insert(
            table.to_string(),
            MemTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Row>,
        _options: &BulkLoadOptions,
    ) -> Result<u64> {
        append_rows(&mut self.working, table, columns, rows)
    }

    async fn copy_mapped(
        &mut self,
        source: &str,
        destination: &str,
        mapping: &ColumnMapping,
        _options: &BulkLoadOptions,
    ) -> Result<u64> {
        let shortfall = self.store.take_copy_shortfall();
        copy_rows(&mut self.working, source, destination, mapping, shortfall)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTx {
    async fn commit(self) -> Result<()> {
        *self.store.lock_tables() = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

fn get_table<'t>(tables: &'t Tables, table: &str) -> Result<&'t MemTable> {
    tables
        .get(table)
        .ok_or_else(|| LoadError::UnknownTable(table.to_string()))
}

fn count_rows(tables: &Tables, table: &str) -> Result<i64> {
    Ok(get_table(tables, table)?.rows.len() as i64)
}

fn columns_of(tables: &Tables, table: &str) -> Result<Vec<String>> {
    Ok(get_table(tables, table)?.columns.clone())
}

fn truncate_rows(tables: &mut Tables, table: &str) -> Result<()> {
    tables
        .get_mut(table)
        .ok_or_else(|| LoadError::UnknownTable(table.to_string()))?
        .rows
        .clear();
    Ok(())
}

fn append_rows(
    tables: &mut Tables,
    table: &str,
    columns: &[String],
    rows: Vec<Row>,
) -> Result<u64> {
    let target = tables
        .get_mut(table)
        .ok_or_else(|| LoadError::UnknownTable(table.to_string()))?;

    let indices: Vec<usize> = columns
        .iter()
        .map(|column| {
            target
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| LoadError::ColumnMismatch {
                    table: table.to_string(),
                    reason: format!("column '{column}' not present in table"),
                })
        })
        .collect::<Result<_>>()?;

    let width = target.columns.len();
    let loaded = rows.len() as u64;
    for row in rows {
        let mut stored: Row = vec![None; width];
        for (value, &index) in row.into_iter().zip(indices.iter()) {
            stored[index] = value;
        }
        target.rows.push(stored);
    }
    Ok(loaded)
}

fn copy_rows(
    tables: &mut Tables,
    source: &str,
    destination: &str,
    mapping: &ColumnMapping,
    shortfall: u64,
) -> Result<u64> {
    let source_table = get_table(tables, source)?.clone();
    let destination_columns = columns_of(tables, destination)?;

    let pairs: Vec<(usize, usize)> = mapping
        .pairs()
        .iter()
        .map(|(from, to)| {
            let from_index = source_table
                .columns
                .iter()
                .position(|c| c == from)
                .ok_or_else(|| LoadError::ColumnMismatch {
                    table: source.to_string(),
                    reason: format!("column '{from}' not present in source"),
                })?;
            let to_index = destination_columns
                .iter()
                .position(|c| c == to)
                .ok_or_else(|| LoadError::ColumnMismatch {
                    table: destination.to_string(),
                    reason: format!("column '{to}' not present in destination"),
                })?;
            Ok((from_index, to_index))
        })
        .collect::<Result<_>>()?;

    let keep = source_table.rows.len().saturating_sub(shortfall as usize);
    let width = destination_columns.len();
    let mut copied = 0u64;
    for row in source_table.rows.iter().take(keep) {
        let mut stored: Row = vec![None; width];
        for &(from_index, to_index) in &pairs {
            stored[to_index] = row[from_index].clone();
        }
        tables
            .get_mut(destination)
            .ok_or_else(|| LoadError::UnknownTable(destination.to_string()))?
            .rows
            .push(stored);
        copied += 1;
    }
    Ok(copied)
}
