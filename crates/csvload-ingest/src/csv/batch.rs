//! Batches and batch accumulation

use std::sync::Arc;

/// One data row: nullable canonical field strings, in column order.
pub type Row = Vec<Option<String>>;

/// A bounded group of rows sharing one column list.
///
/// Exactly one batch per file carries `is_first` and exactly one carries
/// `is_last`; a single-batch file carries both on the same batch. Every row
/// holds exactly `columns().len()` fields.
#[derive(Debug, Clone)]
pub struct Batch {
    columns: Arc<[String]>,
    rows: Vec<Row>,
    /// First batch emitted for the file.
    pub is_first: bool,
    /// Final batch emitted for the file (may be empty when the row count is
    /// an exact multiple of the batch size).
    pub is_last: bool,
}

impl Batch {
    /// Ordered column names shared by every batch of the file.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows currently held by the batch.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consume the batch, yielding its rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Assembles normalized rows into bounded batches.
///
/// Emits eagerly whenever the configured size is reached; [`finish`] flushes
/// whatever remains as the final batch. A file whose rows never fill one
/// batch yields a single batch flagged both first and last; a file with no
/// valid rows yields nothing at all.
///
/// [`finish`]: BatchAccumulator::finish
#[derive(Debug)]
pub struct BatchAccumulator {
    columns: Arc<[String]>,
    batch_size: usize,
    current: Vec<Row>,
    emitted_any: bool,
}

impl BatchAccumulator {
    pub fn new(columns: Arc<[String]>, batch_size: usize) -> Self {
        Self {
            columns,
            batch_size,
            current: Vec::new(),
            emitted_any: false,
        }
    }

    /// Add one row; returns a full batch when the size threshold is reached.
    pub fn push(&mut self, row: Row) -> Option<Batch> {
        debug_assert_eq!(row.len(), self.columns.len());
        self.current.push(row);
        if self.current.len() >= self.batch_size {
            let batch = Batch {
                columns: Arc::clone(&self.columns),
                rows: std::mem::take(&mut self.current),
                is_first: !self.emitted_any,
                is_last: false,
            };
            self.emitted_any = true;
            return Some(batch);
        }
        None
    }

    /// Flush the residual batch at end of input.
    ///
    /// Returns `None` only when no row was ever accumulated. When earlier
    /// batches were emitted and the residue is empty, an empty batch flagged
    /// `is_last` is still produced so the file's transfer triggers exactly
    /// once.
    pub fn finish(self) -> Option<Batch> {
        if !self.emitted_any && self.current.is_empty() {
            return None;
        }
        Some(Batch {
            columns: self.columns,
            rows: self.current,
            is_first: !self.emitted_any,
            is_last: true,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn columns() -> Arc<[String]> {
        vec!["id".to_string(), "name".to_string()].into()
    }

    fn row(n: u32) -> Row {
        vec![Some(n.to_string()), Some(format!("name{n}"))]
    }

    #[test]
    fn test_five_rows_batch_size_two() {
        let mut acc = BatchAccumulator::new(columns(), 2);
        let mut batches = Vec::new();
        for n in 0..5 {
            if let Some(batch) = acc.push(row(n)) {
                batches.push(batch);
            }
        }
        if let Some(batch) = acc.finish() {
            batches.push(batch);
        }

        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches.iter().map(Batch::len).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert!(batches[0].is_first && !batches[0].is_last);
        assert!(!batches[1].is_first && !batches[1].is_last);
        assert!(!batches[2].is_first && batches[2].is_last);
    }

    #[test]
    fn test_single_partial_batch_is_first_and_last() {
        let mut acc = BatchAccumulator::new(columns(), 10);
        assert!(acc.push(row(1)).is_none());
        let batch = acc.finish().unwrap();
        assert!(batch.is_first);
        assert!(batch.is_last);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_exact_multiple_emits_empty_last_batch() {
        let mut acc = BatchAccumulator::new(columns(), 2);
        assert!(acc.push(row(1)).is_none());
        let full = acc.push(row(2)).unwrap();
        assert!(full.is_first && !full.is_last);

        let residual = acc.finish().unwrap();
        assert!(residual.is_last);
        assert!(!residual.is_first);
        assert!(residual.is_empty());
    }

    #[test]
    fn test_no_rows_emits_nothing() {
        let acc = BatchAccumulator::new(columns(), 2);
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_exactly_one_first_and_last_flag() {
        let mut acc = BatchAccumulator::new(columns(), 3);
        let mut batches = Vec::new();
        for n in 0..7 {
            batches.extend(acc.push(row(n)));
        }
        batches.extend(acc.finish());

        assert_eq!(batches.iter().filter(|b| b.is_first).count(), 1);
        assert_eq!(batches.iter().filter(|b| b.is_last).count(), 1);
    }
}
