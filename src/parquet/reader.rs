//! Parquet file reader with streaming support

use crate::error::{ConvertError, Result};
use crate::schema::Schema;
use crate::types::{ColumnType, Value};
use arrow::array::*;
use arrow::datatypes::*;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Parquet file reader that provides row-by-row streaming access
///
/// Reads files produced by [`ParquetBatchWriter`](crate::ParquetBatchWriter)
/// (and any Parquet file with integer, float, boolean or string columns)
/// back into typed rows.
///
/// # Example
///
/// ```no_run
/// use parquetstream::ParquetReader;
///
/// let reader = ParquetReader::open("data.parquet")?;
/// println!("{} rows in {} row groups", reader.row_count(), reader.row_group_count());
///
/// for row in reader.rows()? {
///     println!("{:?}", row?);
/// }
/// # Ok::<(), parquetstream::ConvertError>(())
/// ```
pub struct ParquetReader {
    file_path: PathBuf,
    schema: SchemaRef,
    row_count: usize,
    row_group_count: usize,
}

impl ParquetReader {
    /// Open a Parquet file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        let file = File::open(&file_path).map_err(|e| ConvertError::io(&file_path, e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let metadata = builder.metadata();
        let row_count = metadata.file_metadata().num_rows().try_into().unwrap_or(0);
        let row_group_count = metadata.num_row_groups();
        let schema = builder.schema().clone();

        Ok(Self {
            file_path,
            schema,
            row_count,
            row_group_count,
        })
    }

    /// Get column names from the Parquet schema
    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Get the Arrow schema of the Parquet file
    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Get the file's schema as column types
    pub fn schema(&self) -> Result<Schema> {
        let mut columns = Vec::with_capacity(self.schema.fields().len());
        for field in self.schema.fields() {
            let ty = ColumnType::from_arrow(field.data_type()).ok_or_else(|| {
                ArrowError::NotYetImplemented(format!(
                    "column '{}' has unsupported type {}",
                    field.name(),
                    field.data_type()
                ))
            })?;
            columns.push((field.name().clone(), ty));
        }
        Schema::new(columns)
    }

    /// Get total number of rows in the file
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn row_group_count(&self) -> usize {
        self.row_group_count
    }

    /// Create an iterator over rows
    pub fn rows(&self) -> Result<ParquetRowIterator> {
        let file = File::open(&self.file_path).map_err(|e| ConvertError::io(&self.file_path, e))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        Ok(ParquetRowIterator {
            reader: Box::new(reader),
            current_batch: None,
            current_row: 0,
        })
    }
}

/// Iterator over Parquet rows converted to typed values
pub struct ParquetRowIterator {
    reader: Box<dyn Iterator<Item = std::result::Result<RecordBatch, ArrowError>>>,
    current_batch: Option<RecordBatch>,
    current_row: usize,
}

impl Iterator for ParquetRowIterator {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ref batch) = self.current_batch {
                if self.current_row < batch.num_rows() {
                    let row = extract_row(batch, self.current_row);
                    self.current_row += 1;
                    return Some(row);
                }
            }

            match self.reader.next() {
                Some(Ok(batch)) => {
                    self.current_batch = Some(batch);
                    self.current_row = 0;
                }
                Some(Err(e)) => return Some(Err(e.into())),
                None => return None,
            }
        }
    }
}

fn extract_row(batch: &RecordBatch, row_idx: usize) -> Result<Vec<Value>> {
    batch
        .columns()
        .iter()
        .map(|array| array_value(array, row_idx))
        .collect()
}

fn downcast<T: Array + 'static>(array: &ArrayRef) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        ArrowError::CastError(format!("failed to downcast {} array", array.data_type())).into()
    })
}

fn array_value(array: &ArrayRef, row_idx: usize) -> Result<Value> {
    if array.is_null(row_idx) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Utf8 => Value::Text(downcast::<StringArray>(array)?.value(row_idx).to_string()),
        DataType::LargeUtf8 => {
            Value::Text(downcast::<LargeStringArray>(array)?.value(row_idx).to_string())
        }
        DataType::Int8 => Value::Int(downcast::<Int8Array>(array)?.value(row_idx).into()),
        DataType::Int16 => Value::Int(downcast::<Int16Array>(array)?.value(row_idx).into()),
        DataType::Int32 => Value::Int(downcast::<Int32Array>(array)?.value(row_idx).into()),
        DataType::Int64 => Value::Int(downcast::<Int64Array>(array)?.value(row_idx)),
        DataType::Float32 => Value::Float(downcast::<Float32Array>(array)?.value(row_idx).into()),
        DataType::Float64 => Value::Float(downcast::<Float64Array>(array)?.value(row_idx)),
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(array)?.value(row_idx)),
        other => {
            return Err(ArrowError::NotYetImplemented(format!(
                "reading {} columns is not supported",
                other
            ))
            .into())
        }
    };
    Ok(value)
}
