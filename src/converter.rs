//! High-level CSV → Parquet conversion

use crate::batch_reader::{BatchReader, DEFAULT_BATCH_SIZE};
use crate::error::{ConvertError, Result};
use crate::parquet::{BatchSink, ParquetBatchWriter, WriterState};
use crate::schema::{Schema, SchemaResolver};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Extension of derived destination paths
pub const PARQUET_EXTENSION: &str = "parquet";

/// Parameters of one conversion run
///
/// # Example
///
/// ```no_run
/// use parquetstream::{ConversionJob, Converter};
///
/// let job = ConversionJob::new("data.csv")
///     .destination("out/data.parquet")
///     .batch_size(50_000)
///     .delimiter(b';')
///     .null_values(["", "NA"]);
///
/// let summary = Converter::new(job)?.run()?;
/// println!("{} rows in {} row groups", summary.rows_written, summary.row_groups);
/// # Ok::<(), parquetstream::ConvertError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConversionJob {
    source: PathBuf,
    destination: Option<PathBuf>,
    batch_size: usize,
    delimiter: u8,
    quote_char: u8,
    null_values: Vec<String>,
    keep_partial_output: bool,
}

impl ConversionJob {
    /// Create a job for `source` with default settings
    pub fn new<P: AsRef<Path>>(source: P) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            destination: None,
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: b',',
            quote_char: b'"',
            null_values: vec![String::new()],
            keep_partial_output: false,
        }
    }

    /// Explicit output path; defaults to the source path with a `.parquet` extension
    #[must_use]
    pub fn destination<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.destination = Some(path.as_ref().to_path_buf());
        self
    }

    /// Rows per batch and per row group (must be greater than zero)
    #[must_use]
    pub fn batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows;
        self
    }

    #[must_use]
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    #[must_use]
    pub fn quote_char(mut self, quote: u8) -> Self {
        self.quote_char = quote;
        self
    }

    /// Cell texts read as null. Defaults to the empty string only.
    #[must_use]
    pub fn null_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.null_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Publish the finalized partial output at the destination when a run fails
    #[must_use]
    pub fn keep_partial_output(mut self, keep: bool) -> Self {
        self.keep_partial_output = keep;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Output path, explicit or derived from the source
    pub fn output_path(&self) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| default_destination(&self.source))
    }

    pub fn rows_per_batch(&self) -> usize {
        self.batch_size
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConvertError::InvalidJob(
                "batch size must be greater than zero".to_string(),
            ));
        }
        if self.delimiter == self.quote_char {
            return Err(ConvertError::InvalidJob(
                "delimiter and quote character must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Source path with its extension replaced by `.parquet`
pub fn default_destination(source: &Path) -> PathBuf {
    source.with_extension(PARQUET_EXTENSION)
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConversionSummary {
    /// Total data rows written
    pub rows_written: usize,
    /// Row groups written, one per batch
    pub row_groups: usize,
    pub destination: PathBuf,
    /// Schema locked from the first batch
    pub schema: Schema,
}

/// Runs a [`ConversionJob`]: reads batches, locks the schema, writes row groups
///
/// The writer is opened lazily on the first batch and closed exactly once on
/// every exit path, successful or not. When a run fails, the writer is
/// abandoned before that close, so no partial output is published and an
/// earlier file at the destination survives, unless
/// [`ConversionJob::keep_partial_output`] was set.
pub struct Converter {
    job: ConversionJob,
    destination: PathBuf,
}

impl Converter {
    /// Validate the job and fix its destination
    pub fn new(job: ConversionJob) -> Result<Self> {
        job.validate()?;
        let destination = job.output_path();
        Ok(Self { job, destination })
    }

    pub fn job(&self) -> &ConversionJob {
        &self.job
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Convert to Parquet
    pub fn run(&self) -> Result<ConversionSummary> {
        self.run_with_progress(|_, _| {})
    }

    /// Convert with progress callback
    ///
    /// `callback` is called with `(rows_written, row_groups)` after every batch.
    pub fn run_with_progress<F>(&self, callback: F) -> Result<ConversionSummary>
    where
        F: FnMut(usize, usize),
    {
        let mut writer = ParquetBatchWriter::new().with_row_group_size(self.job.batch_size);
        self.run_with(&mut writer, callback)
    }

    /// Convert into a caller-supplied sink
    pub fn run_with<W, F>(&self, writer: &mut W, mut callback: F) -> Result<ConversionSummary>
    where
        W: BatchSink + ?Sized,
        F: FnMut(usize, usize),
    {
        let outcome = self.pipeline(writer, &mut callback);
        if outcome.is_err() && writer.state() == WriterState::Open {
            if self.job.keep_partial_output {
                tracing::warn!(
                    path = %self.destination.display(),
                    "conversion failed, keeping partial output"
                );
            } else {
                writer.abandon();
            }
        }
        let closed = writer.close();

        match (outcome, closed) {
            (Ok(summary), Ok(())) => {
                tracing::info!(
                    source = %self.job.source.display(),
                    destination = %summary.destination.display(),
                    rows = summary.rows_written,
                    row_groups = summary.row_groups,
                    "conversion complete"
                );
                Ok(summary)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!(error = %close_err, "failed to close writer after error");
                }
                Err(e)
            }
        }
    }

    fn pipeline<W, F>(&self, writer: &mut W, callback: &mut F) -> Result<ConversionSummary>
    where
        W: BatchSink + ?Sized,
        F: FnMut(usize, usize),
    {
        let source = &self.job.source;
        if !source.exists() {
            return Err(ConvertError::SourceNotFound {
                path: source.clone(),
            });
        }
        if is_same_file(source, &self.destination) {
            return Err(ConvertError::InvalidJob(format!(
                "destination {} would overwrite the source",
                self.destination.display()
            )));
        }

        let mut reader = BatchReader::open(source, self.job.batch_size)?
            .delimiter(self.job.delimiter)
            .quote_char(self.job.quote_char)
            .null_values(self.job.null_values.iter().cloned());

        let Some(first) = reader.next_batch()? else {
            return Err(ConvertError::EmptySource {
                path: source.clone(),
            });
        };

        let schema = SchemaResolver::resolve(&first)?;
        writer.open(&self.destination, &schema)?;
        writer.write_batch(&first)?;
        let mut rows_written = first.num_rows();
        let mut row_groups = 1;
        callback(rows_written, row_groups);
        drop(first);

        for batch in reader {
            let batch = batch?;
            SchemaResolver::validate(&batch, &schema)?;
            writer.write_batch(&batch)?;
            rows_written += batch.num_rows();
            row_groups += 1;
            callback(rows_written, row_groups);
        }

        Ok(ConversionSummary {
            rows_written,
            row_groups,
            destination: self.destination.clone(),
            schema,
        })
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Convert a CSV file to Parquet in batches of `batch_size` rows
///
/// `destination` defaults to `source` with a `.parquet` extension.
/// Returns the number of rows written.
///
/// # Example
///
/// ```no_run
/// let rows = parquetstream::convert("data.csv", None, 10_000)?;
/// println!("converted {} rows", rows);
/// # Ok::<(), parquetstream::ConvertError>(())
/// ```
pub fn convert<P: AsRef<Path>>(
    source: P,
    destination: Option<&Path>,
    batch_size: usize,
) -> Result<usize> {
    let mut job = ConversionJob::new(source).batch_size(batch_size);
    if let Some(destination) = destination {
        job = job.destination(destination);
    }
    Ok(Converter::new(job)?.run()?.rows_written)
}
