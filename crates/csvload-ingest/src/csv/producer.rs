//! CSV batch producer
//!
//! Pull-based lazy sequence of [`Batch`]es over one file. The consumer
//! drives production by calling [`CsvBatchProducer::next_batch`]; nothing is
//! read ahead of the batch being built, and dropping the producer closes the
//! underlying file. Row-level problems are reported to the caller's
//! [`RowErrorSink`] and the offending row is dropped; only file-open
//! failures, a missing header, or mid-file I/O errors propagate.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::Arc;

use csvload_common::{LoadError, Result};
use tracing::debug;

use super::batch::{Batch, BatchAccumulator, Row};
use super::normalize::normalize_field;
use super::tokenizer::tokenize;
use crate::audit::ErrorRecord;

/// Receives one error record per dropped row.
///
/// Implementations buffer or forward the records; the producer itself never
/// touches the store, so the caller decides when records become durable.
pub trait RowErrorSink {
    fn record(&mut self, record: ErrorRecord);
}

impl RowErrorSink for Vec<ErrorRecord> {
    fn record(&mut self, record: ErrorRecord) {
        self.push(record);
    }
}

/// Streams one CSV file as a sequence of bounded batches.
pub struct CsvBatchProducer<R: BufRead> {
    lines: Lines<R>,
    file_label: String,
    columns: Arc<[String]>,
    accumulator: Option<BatchAccumulator>,
    batches_emitted: u64,
}

impl CsvBatchProducer<BufReader<File>> {
    /// Open a CSV file and parse its header line.
    ///
    /// Fails when the file cannot be opened or the header is missing/empty.
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), label, batch_size)
    }
}

impl<R: BufRead> CsvBatchProducer<R> {
    /// Build a producer over any buffered reader (tests use byte slices).
    pub fn from_reader(reader: R, file_label: impl Into<String>, batch_size: usize) -> Result<Self> {
        let file_label = file_label.into();
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => return Err(err.into()),
            None => return Err(LoadError::EmptyHeader(file_label)),
        };
        if header.trim().is_empty() {
            return Err(LoadError::EmptyHeader(file_label));
        }

        let columns: Arc<[String]> = tokenize(&header)
            .into_iter()
            .map(|field| field.trim().to_string())
            .collect::<Vec<_>>()
            .into();

        Ok(Self {
            lines,
            file_label,
            columns: Arc::clone(&columns),
            accumulator: Some(BatchAccumulator::new(columns, batch_size)),
            batches_emitted: 0,
        })
    }

    /// Column names parsed from the header, trimmed, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn file_label(&self) -> &str {
        &self.file_label
    }

    /// Pull the next batch, recording dropped rows into `sink`.
    ///
    /// Returns `Ok(None)` once the file is exhausted. Blank lines are
    /// skipped silently; rows whose field count differs from the header are
    /// reported and dropped without counting toward the batch size.
    pub fn next_batch(&mut self, sink: &mut dyn RowErrorSink) -> Result<Option<Batch>> {
        loop {
            let Some(accumulator) = self.accumulator.as_mut() else {
                return Ok(None);
            };

            match self.lines.next() {
                None => {
                    let residual = self
                        .accumulator
                        .take()
                        .and_then(BatchAccumulator::finish);
                    if let Some(ref batch) = residual {
                        self.batches_emitted += 1;
                        debug!(
                            file = %self.file_label,
                            rows = batch.len(),
                            batch = self.batches_emitted,
                            "Flushed final batch"
                        );
                    }
                    return Ok(residual);
                },
                Some(Err(err)) => {
                    self.accumulator = None;
                    return Err(err.into());
                },
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let fields = tokenize(&line);
                    if fields.len() != self.columns.len() {
                        sink.record(ErrorRecord::row_structure(&self.file_label));
                        continue;
                    }
                    let row: Row = fields.iter().map(|field| normalize_field(field)).collect();
                    if let Some(batch) = accumulator.push(row) {
                        self.batches_emitted += 1;
                        debug!(
                            file = %self.file_label,
                            rows = batch.len(),
                            batch = self.batches_emitted,
                            "Emitted batch"
                        );
                        return Ok(Some(batch));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn producer(data: &str, batch_size: usize) -> CsvBatchProducer<&[u8]> {
        CsvBatchProducer::from_reader(data.as_bytes(), "test.csv", batch_size).unwrap()
    }

    fn drain(
        producer: &mut CsvBatchProducer<&[u8]>,
        sink: &mut Vec<ErrorRecord>,
    ) -> Vec<Batch> {
        let mut batches = Vec::new();
        while let Some(batch) = producer.next_batch(sink).unwrap() {
            batches.push(batch);
        }
        batches
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let result = CsvBatchProducer::from_reader(&b""[..], "empty.csv", 10);
        assert!(matches!(result, Err(LoadError::EmptyHeader(_))));
    }

    #[test]
    fn test_blank_header_is_fatal() {
        let result = CsvBatchProducer::from_reader(&b"   \n1,2\n"[..], "blank.csv", 10);
        assert!(matches!(result, Err(LoadError::EmptyHeader(_))));
    }

    #[test]
    fn test_header_fields_are_trimmed() {
        let producer = producer("id , name ,amount\n", 10);
        assert_eq!(producer.columns(), ["id", "name", "amount"]);
    }

    #[test]
    fn test_five_rows_batch_size_two() {
        let mut producer = producer("id,name\n1,a\n2,b\n3,c\n4,d\n5,e\n", 2);
        let mut sink = Vec::new();
        let batches = drain(&mut producer, &mut sink);

        assert_eq!(
            batches.iter().map(Batch::len).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert!(batches[0].is_first);
        assert!(batches[2].is_last);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_blank_lines_skipped_silently() {
        let mut producer = producer("id,name\n\n1,a\n   \n2,b\n", 10);
        let mut sink = Vec::new();
        let batches = drain(&mut producer, &mut sink);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_row_length_mismatch_audited_and_dropped() {
        let mut producer = producer("id,name,amount\n1,Alice,10.5\n2,Bob,abc,extra\n", 10);
        let mut sink = Vec::new();
        let batches = drain(&mut producer, &mut sink);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(
            batches[0].rows()[0],
            vec![
                Some("1".to_string()),
                Some("Alice".to_string()),
                Some("10.50".to_string())
            ]
        );

        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].column_name, "Row Structure");
        assert_eq!(sink[0].error_type, "CSV Parsing Error");
        assert!(sink[0].reason.contains("Row length mismatch"));
        assert_eq!(sink[0].file_name, "test.csv");
    }

    #[test]
    fn test_zero_valid_rows_emits_no_batches() {
        let mut producer = producer("id,name\n\nonly-one-field\n", 10);
        let mut sink = Vec::new();
        let batches = drain(&mut producer, &mut sink);

        assert!(batches.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_fields_normalized_per_row() {
        let mut producer = producer("id,joined,amount\n 7 ,01-02-2020,  \n", 10);
        let mut sink = Vec::new();
        let batches = drain(&mut producer, &mut sink);

        assert_eq!(
            batches[0].rows()[0],
            vec![Some("7".to_string()), Some("2020-02-01".to_string()), None]
        );
    }

    #[test]
    fn test_exhausted_producer_keeps_returning_none() {
        let mut producer = producer("id\n1\n", 10);
        let mut sink = Vec::new();
        assert!(producer.next_batch(&mut sink).unwrap().is_some());
        assert!(producer.next_batch(&mut sink).unwrap().is_none());
        assert!(producer.next_batch(&mut sink).unwrap().is_none());
    }

    #[test]
    fn test_batch_concatenation_preserves_file_order() {
        let mut producer = producer("id\n1\n2\n3\n4\n5\n6\n7\n", 3);
        let mut sink = Vec::new();
        let batches = drain(&mut producer, &mut sink);

        let all: Vec<String> = batches
            .iter()
            .flat_map(|b| b.rows().iter())
            .map(|row| row[0].clone().unwrap())
            .collect();
        assert_eq!(all, ["1", "2", "3", "4", "5", "6", "7"]);
    }
}
