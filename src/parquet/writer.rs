//! Incremental Parquet writing, one row group per batch

use crate::batch_reader::{Batch, DEFAULT_BATCH_SIZE};
use crate::error::{ConvertError, Result};
use crate::schema::{Schema, SchemaResolver};
use crate::types::{ColumnType, Value};
use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Lifecycle of a columnar writer
///
/// `Unopened --open--> Open --write_batch--> Open --close--> Closed`.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Unopened,
    Open,
    Closed,
}

/// Destination for schema-conformant batches
///
/// Implementors must accept exactly one `open`, any number of `write_batch`
/// calls while open, and treat `close` as idempotent so cleanup code can call
/// it unconditionally.
pub trait BatchSink {
    /// Acquire the destination and record the schema every batch must follow
    fn open(&mut self, destination: &Path, schema: &Schema) -> Result<()>;

    /// Append one batch as one row group
    fn write_batch(&mut self, batch: &Batch) -> Result<()>;

    /// Mark the output as failed, so the following `close` does not publish it
    ///
    /// Sinks that write in place have nothing to withhold and may ignore this.
    fn abandon(&mut self) {}

    /// Flush, finalize and release the destination; a no-op once closed
    fn close(&mut self) -> Result<()>;

    fn state(&self) -> WriterState;
}

struct OpenWriter {
    // Staged next to the destination and renamed over it on close
    writer: ArrowWriter<NamedTempFile>,
    schema: Schema,
    arrow_schema: SchemaRef,
    path: PathBuf,
}

enum Inner {
    Unopened,
    Open(Box<OpenWriter>),
    Closed,
}

/// Parquet file writer that appends each [`Batch`] as its own row group
///
/// Output goes to a temporary file in the destination's directory. `close`
/// renames it over the destination, so readers never see a half-written
/// file and a failed run leaves any earlier output in place.
///
/// # Examples
///
/// ```no_run
/// use parquetstream::{BatchReader, BatchSink, ParquetBatchWriter, SchemaResolver};
/// use std::path::Path;
///
/// let mut reader = BatchReader::open("data.csv", 1_000)?;
/// let first = reader.next_batch()?.expect("at least one row");
/// let schema = SchemaResolver::resolve(&first)?;
///
/// let mut writer = ParquetBatchWriter::new();
/// writer.open(Path::new("data.parquet"), &schema)?;
/// writer.write_batch(&first)?;
/// for batch in reader {
///     writer.write_batch(&batch?)?;
/// }
/// writer.close()?;
/// # Ok::<(), parquetstream::ConvertError>(())
/// ```
pub struct ParquetBatchWriter {
    inner: Inner,
    row_group_size: usize,
    rows_written: u64,
    row_groups_written: u64,
    abandoned: bool,
}

impl Default for ParquetBatchWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetBatchWriter {
    /// Create an unopened writer
    pub fn new() -> Self {
        Self {
            inner: Inner::Unopened,
            row_group_size: DEFAULT_BATCH_SIZE,
            rows_written: 0,
            row_groups_written: 0,
            abandoned: false,
        }
    }

    /// Largest batch that must fit in one row group (builder pattern)
    ///
    /// Batches larger than this would be split across row groups.
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn row_groups_written(&self) -> u64 {
        self.row_groups_written
    }

    /// Schema recorded by `open`, while the writer is open
    pub fn schema(&self) -> Option<&Schema> {
        match &self.inner {
            Inner::Open(open) => Some(&open.schema),
            _ => None,
        }
    }

    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

impl BatchSink for ParquetBatchWriter {
    fn open(&mut self, destination: &Path, schema: &Schema) -> Result<()> {
        match self.inner {
            Inner::Unopened => {}
            Inner::Open(_) => {
                return Err(ConvertError::Resource("writer is already open".to_string()))
            }
            Inner::Closed => {
                return Err(ConvertError::Resource(
                    "cannot reopen a closed writer".to_string(),
                ))
            }
        }

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(".parquetstream-").suffix(".tmp");
        #[cfg(unix)]
        {
            // Temp files default to owner-only; published output should not be
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let staged = builder
            .tempfile_in(dir)
            .map_err(|e| ConvertError::io(destination, e))?;
        let arrow_schema = schema.to_arrow();
        // On failure the staged file is dropped, which deletes it
        let writer =
            ArrowWriter::try_new(staged, arrow_schema.clone(), Some(self.build_properties()))?;

        tracing::debug!(path = %destination.display(), schema = %schema, "opened parquet writer");
        self.inner = Inner::Open(Box::new(OpenWriter {
            writer,
            schema: schema.clone(),
            arrow_schema,
            path: destination.to_path_buf(),
        }));
        Ok(())
    }

    fn write_batch(&mut self, batch: &Batch) -> Result<()> {
        let open = match &mut self.inner {
            Inner::Open(open) => open,
            Inner::Unopened => {
                return Err(ConvertError::Resource(
                    "write attempted before open".to_string(),
                ))
            }
            Inner::Closed => {
                return Err(ConvertError::Resource(
                    "write attempted on a closed writer".to_string(),
                ))
            }
        };

        SchemaResolver::validate(batch, &open.schema)?;
        if batch.is_empty() {
            return Ok(());
        }

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(open.schema.len());
        for (col, field) in open.schema.fields().enumerate() {
            columns.push(build_column(batch, col, field.name, field.column_type)?);
        }

        let record_batch = RecordBatch::try_new(open.arrow_schema.clone(), columns)?;
        open.writer.write(&record_batch)?;
        // Close the row group so batch boundaries become row-group boundaries
        open.writer.flush()?;

        self.rows_written += batch.num_rows() as u64;
        self.row_groups_written += 1;
        tracing::debug!(
            path = %open.path.display(),
            rows = batch.num_rows(),
            row_group = self.row_groups_written,
            "wrote row group"
        );
        Ok(())
    }

    fn abandon(&mut self) {
        self.abandoned = true;
    }

    fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Open(open) => {
                let OpenWriter { writer, path, .. } = *open;
                let staged = writer.into_inner()?;
                if self.abandoned {
                    drop(staged);
                    tracing::debug!(path = %path.display(), "discarded abandoned parquet output");
                    return Ok(());
                }
                staged
                    .persist(&path)
                    .map_err(|e| ConvertError::io(&path, e.error))?;
                tracing::debug!(
                    path = %path.display(),
                    rows = self.rows_written,
                    row_groups = self.row_groups_written,
                    "closed parquet writer"
                );
                Ok(())
            }
            Inner::Unopened | Inner::Closed => Ok(()),
        }
    }

    fn state(&self) -> WriterState {
        match self.inner {
            Inner::Unopened => WriterState::Unopened,
            Inner::Open(_) => WriterState::Open,
            Inner::Closed => WriterState::Closed,
        }
    }
}

impl Drop for ParquetBatchWriter {
    fn drop(&mut self) {
        if self.state() == WriterState::Open {
            // Only an explicit close publishes the output
            self.abandon();
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "failed to close parquet writer on drop");
            }
        }
    }
}

/// Convert one column of a batch into an Arrow array of the locked type
fn build_column(batch: &Batch, col: usize, name: &str, ty: ColumnType) -> Result<ArrayRef> {
    let rows = batch.num_rows();
    let unexpected = |value: &Value| ConvertError::SchemaMismatch {
        column: name.to_string(),
        expected: ty,
        found: value.column_type(),
    };

    let array: ArrayRef = match ty {
        ColumnType::Int64 => {
            let mut builder = Int64Builder::with_capacity(rows);
            for value in batch.column_values(col) {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Int(i) => builder.append_value(*i),
                    other => return Err(unexpected(other)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Float64 => {
            let mut builder = Float64Builder::with_capacity(rows);
            for value in batch.column_values(col) {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Int(i) => builder.append_value(*i as f64),
                    Value::Float(f) => builder.append_value(*f),
                    other => return Err(unexpected(other)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(rows);
            for value in batch.column_values(col) {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(*b),
                    other => return Err(unexpected(other)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Utf8 | ColumnType::Null => {
            let mut builder = StringBuilder::with_capacity(rows, rows * 16);
            for value in batch.column_values(col) {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Text(s) => builder.append_value(s),
                    other => return Err(unexpected(other)),
                }
            }
            Arc::new(builder.finish())
        }
    };
    Ok(array)
}
