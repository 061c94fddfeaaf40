//! # parquetstream
//!
//! Streaming CSV → Parquet conversion with bounded memory.
//!
//! The source is read in batches of a fixed number of rows. Column types are
//! inferred per batch with a fixed promotion order (integer, float, boolean,
//! text). The first batch locks the schema; every later batch is checked
//! against it before being appended to the output as its own row group.
//! Only one batch is held in memory at a time, whatever the size of the
//! source.
//!
//! ## Quick start
//!
//! ```no_run
//! // data.csv → data.parquet, 10 000 rows per row group
//! let rows = parquetstream::convert("data.csv", None, 10_000)?;
//! println!("{} rows written", rows);
//! # Ok::<(), parquetstream::ConvertError>(())
//! ```
//!
//! ## Configured run
//!
//! ```no_run
//! use parquetstream::{ConversionJob, Converter};
//!
//! let job = ConversionJob::new("export.tsv")
//!     .destination("export.parquet")
//!     .delimiter(b'\t')
//!     .null_values(["", "NULL"])
//!     .batch_size(50_000);
//!
//! let summary = Converter::new(job)?.run_with_progress(|rows, groups| {
//!     println!("{} rows / {} row groups", rows, groups);
//! })?;
//! println!("schema: {}", summary.schema);
//! # Ok::<(), parquetstream::ConvertError>(())
//! ```
//!
//! ## Failure handling
//!
//! Every error is fatal to the run. The writer is closed on every exit path.
//! Output is staged in a temporary file and only renamed over the destination
//! when the run succeeds, so a failed run leaves no partial file and keeps any
//! earlier output, unless [`ConversionJob::keep_partial_output`] is set.
//! A source with a header but no data rows fails with
//! [`ConvertError::EmptySource`] without creating an output file.

pub mod batch_reader;
pub mod converter;
pub mod csv;
pub mod error;
pub mod parquet;
pub mod schema;
pub mod types;

pub use batch_reader::{
    Batch, BatchReader, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RECORD_BYTES, DEFAULT_MAX_RECORD_LINES,
};
pub use converter::{convert, default_destination, ConversionJob, ConversionSummary, Converter};
pub use error::{ConvertError, ErrorKind, Result};
pub use crate::parquet::{BatchSink, ParquetBatchWriter, ParquetReader, WriterState};
pub use schema::{Field, Schema, SchemaResolver};
pub use types::{ColumnType, Value};
