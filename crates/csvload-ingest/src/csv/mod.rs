//! CSV parsing and batching
//!
//! Turns a delimited text file into a lazy sequence of bounded [`Batch`]es:
//! lines are tokenized, fields normalized to canonical text, and rows
//! accumulated until the configured batch size is reached. Malformed rows
//! are reported to a [`RowErrorSink`] and skipped; they never abort a file.

pub mod batch;
pub mod normalize;
pub mod producer;
pub mod tokenizer;

pub use batch::{Batch, BatchAccumulator, Row};
pub use normalize::normalize_field;
pub use producer::{CsvBatchProducer, RowErrorSink};
pub use tokenizer::tokenize;
