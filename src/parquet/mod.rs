//! Parquet writing and read-back
//!
//! [`ParquetBatchWriter`] appends one row group per [`Batch`](crate::Batch),
//! so memory use stays bounded by the batch size no matter how large the
//! source is. [`ParquetReader`] streams the rows of a finished file back as
//! typed values.
//!
//! # Example
//!
//! ```no_run
//! use parquetstream::parquet::ParquetReader;
//!
//! let reader = ParquetReader::open("data.parquet")?;
//! println!("columns: {:?}", reader.column_names());
//!
//! for row in reader.rows()? {
//!     println!("{:?}", row?);
//! }
//! # Ok::<(), parquetstream::ConvertError>(())
//! ```

pub mod reader;
pub mod writer;

pub use reader::{ParquetReader, ParquetRowIterator};
pub use writer::{BatchSink, ParquetBatchWriter, WriterState};
