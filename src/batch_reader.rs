//! Bounded-size batch reading of CSV files with per-batch type inference

use crate::csv::CsvParser;
use crate::error::{ConvertError, Result};
use crate::types::{ColumnType, Value};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default number of rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default limit on the physical lines one quoted record may span
pub const DEFAULT_MAX_RECORD_LINES: usize = 1_000;

/// Default limit on the size in bytes of one logical record
pub const DEFAULT_MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;

/// A bounded block of typed rows read together
///
/// Every row has one value per column. Values in a column all have the
/// column's inferred type, or are null.
#[derive(Debug, Clone)]
pub struct Batch {
    columns: Arc<[String]>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<Value>>,
    first_line: u64,
}

impl Batch {
    /// Build a batch from already typed rows, inferring column types from the values
    ///
    /// Fails if a row has the wrong width or a column mixes incompatible types.
    pub fn from_rows(columns: Arc<[String]>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut types = vec![ColumnType::Null; columns.len()];
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ConvertError::Resource(format!(
                    "row {} has {} values for {} columns",
                    idx,
                    row.len(),
                    columns.len()
                )));
            }
            for (col, value) in row.iter().enumerate() {
                let found = value.column_type();
                if found.promotes_to(types[col]) {
                    continue;
                }
                if !types[col].promotes_to(found) {
                    return Err(ConvertError::SchemaMismatch {
                        column: columns[col].clone(),
                        expected: types[col],
                        found,
                    });
                }
                types[col] = found;
            }
        }
        Ok(Self {
            columns,
            types,
            rows,
            first_line: 0,
        })
    }

    /// Column names in source order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Inferred type of each column
    pub fn types(&self) -> &[ColumnType] {
        &self.types
    }

    /// Rows in source order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 1-based source line of the first row (0 for batches not read from a file)
    pub fn first_line(&self) -> u64 {
        self.first_line
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[col])
    }

    /// View a row as a column name → value mapping
    pub fn row_map(&self, idx: usize) -> Option<IndexMap<&str, &Value>> {
        let row = self.rows.get(idx)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter())
                .collect(),
        )
    }
}

/// Reads a CSV file as a lazy sequence of typed [`Batch`]es
///
/// The first non-blank record is the header. Blank lines are skipped, and
/// quoted fields may span lines, up to [`max_record_lines`](Self::max_record_lines)
/// lines and [`max_record_bytes`](Self::max_record_bytes) bytes per record.
/// Each batch holds at most `batch_size` rows. The sequence cannot be restarted and ends permanently after the first
/// error.
///
/// # Examples
///
/// ```no_run
/// use parquetstream::BatchReader;
///
/// let reader = BatchReader::open("data.csv", 1_000)?.delimiter(b';');
///
/// for batch in reader {
///     let batch = batch?;
///     println!("{} rows, types {:?}", batch.num_rows(), batch.types());
/// }
/// # Ok::<(), parquetstream::ConvertError>(())
/// ```
pub struct BatchReader {
    reader: BufReader<File>,
    path: PathBuf,
    batch_size: usize,
    null_values: Vec<String>,
    headers: Option<Arc<[String]>>,

    // Configuration
    delimiter: u8,
    quote_char: u8,
    max_record_lines: usize,
    max_record_bytes: usize,

    // Parser state
    line_buffer: String,
    line_ending: &'static str,
    line: u64,
    rows_read: u64,
    batches_read: u64,
    finished: bool,
}

impl BatchReader {
    /// Open a CSV file for batch reading
    ///
    /// Fails with [`ConvertError::SourceNotFound`] if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if batch_size == 0 {
            return Err(ConvertError::InvalidJob(
                "batch size must be greater than zero".to_string(),
            ));
        }

        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConvertError::SourceNotFound { path: path.clone() },
            _ => ConvertError::io(&path, e),
        })?;

        Ok(BatchReader {
            reader: BufReader::new(file),
            path,
            batch_size,
            null_values: vec![String::new()],
            headers: None,
            delimiter: b',',
            quote_char: b'"',
            max_record_lines: DEFAULT_MAX_RECORD_LINES,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            line_buffer: String::with_capacity(1024),
            line_ending: "",
            line: 0,
            rows_read: 0,
            batches_read: 0,
            finished: false,
        })
    }

    /// Set custom delimiter (builder pattern)
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// Set custom quote character (builder pattern)
    pub fn quote_char(mut self, quote: u8) -> Self {
        self.quote_char = quote;
        self
    }

    /// Limit on the physical lines one record may span (builder pattern)
    ///
    /// A stray quote otherwise turns the rest of the file into one field.
    pub fn max_record_lines(mut self, lines: usize) -> Self {
        self.max_record_lines = lines.max(1);
        self
    }

    /// Limit on the size in bytes of one record (builder pattern)
    pub fn max_record_bytes(mut self, bytes: usize) -> Self {
        self.max_record_bytes = bytes.max(1);
        self
    }

    /// Cell texts read as null (builder pattern). Defaults to the empty string.
    pub fn null_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.null_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Header row, once the first batch has been requested
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of data rows read so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Number of batches produced so far
    pub fn batches_read(&self) -> u64 {
        self.batches_read
    }

    /// Number of physical lines consumed so far
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Read the next batch, or `Ok(None)` at end of input
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        let headers = match self.ensure_headers()? {
            Some(headers) => headers,
            None => return Ok(None),
        };

        let mut records: Vec<(u64, Vec<String>)> =
            Vec::with_capacity(self.batch_size.min(4096));
        while records.len() < self.batch_size {
            let Some((line, fields)) = self.read_record()? else {
                break;
            };
            if fields.len() != headers.len() {
                return Err(ConvertError::Parse {
                    line,
                    message: format!(
                        "expected {} fields, found {}",
                        headers.len(),
                        fields.len()
                    ),
                });
            }
            records.push((line, fields));
        }

        if records.is_empty() {
            return Ok(None);
        }

        let batch = self.build_batch(headers, records)?;
        self.rows_read += batch.num_rows() as u64;
        self.batches_read += 1;
        tracing::debug!(
            path = %self.path.display(),
            batch = self.batches_read,
            rows = batch.num_rows(),
            first_line = batch.first_line,
            "read batch"
        );
        Ok(Some(batch))
    }

    fn ensure_headers(&mut self) -> Result<Option<Arc<[String]>>> {
        if let Some(ref headers) = self.headers {
            return Ok(Some(headers.clone()));
        }

        let Some((line, mut fields)) = self.read_record()? else {
            return Ok(None);
        };

        if let Some(first) = fields.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }

        for (idx, name) in fields.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConvertError::Parse {
                    line,
                    message: format!("header column {} has no name", idx + 1),
                });
            }
            if fields[..idx].contains(name) {
                return Err(ConvertError::Parse {
                    line,
                    message: format!("duplicate header column '{}'", name),
                });
            }
        }

        let headers: Arc<[String]> = fields.into();
        self.headers = Some(headers.clone());
        Ok(Some(headers))
    }

    /// Read one logical record, joining physical lines inside quoted fields
    ///
    /// Returns the 1-based line the record starts on. Line terminators inside
    /// a quoted field are kept as they appear in the source.
    fn read_record(&mut self) -> Result<Option<(u64, Vec<String>)>> {
        let parser = CsvParser::new(self.delimiter, self.quote_char);
        let mut record = String::new();
        let mut start_line = 0;
        let mut lines_in_record = 0;
        let mut in_quotes = false;

        loop {
            if !self.read_physical_line()? {
                if start_line == 0 {
                    return Ok(None);
                }
                return Err(ConvertError::Parse {
                    line: start_line,
                    message: "unterminated quoted field at end of file".to_string(),
                });
            }

            if start_line == 0 {
                if self.line_buffer.is_empty() {
                    // Blank line
                    continue;
                }
                start_line = self.line;
            }
            record.push_str(&self.line_buffer);
            lines_in_record += 1;

            // Only the new line is scanned, so a long record costs linear time
            if parser.toggles_quote(&self.line_buffer) {
                in_quotes = !in_quotes;
            }
            if !in_quotes {
                break;
            }

            if lines_in_record >= self.max_record_lines {
                return Err(ConvertError::Parse {
                    line: start_line,
                    message: format!(
                        "quoted field spans more than {} lines",
                        self.max_record_lines
                    ),
                });
            }
            if record.len() > self.max_record_bytes {
                return Err(ConvertError::Parse {
                    line: start_line,
                    message: format!(
                        "quoted field exceeds {} bytes",
                        self.max_record_bytes
                    ),
                });
            }
            record.push_str(self.line_ending);
        }

        let fields = parser
            .parse_record(&record)
            .map_err(|e| ConvertError::Parse {
                line: start_line,
                message: e.to_string(),
            })?;
        Ok(Some((start_line, fields)))
    }

    /// Fill `line_buffer` with the next line, without its terminator
    fn read_physical_line(&mut self) -> Result<bool> {
        self.line_buffer.clear();
        let bytes_read = self
            .reader
            .read_line(&mut self.line_buffer)
            .map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData => ConvertError::Parse {
                    line: self.line + 1,
                    message: "invalid UTF-8".to_string(),
                },
                _ => ConvertError::io(&self.path, e),
            })?;

        if bytes_read == 0 {
            return Ok(false);
        }

        self.line += 1;
        self.line_ending = "";
        if self.line_buffer.ends_with('\n') {
            self.line_buffer.pop();
            self.line_ending = "\n";
            if self.line_buffer.ends_with('\r') {
                self.line_buffer.pop();
                self.line_ending = "\r\n";
            }
        }
        Ok(true)
    }

    fn build_batch(
        &self,
        columns: Arc<[String]>,
        records: Vec<(u64, Vec<String>)>,
    ) -> Result<Batch> {
        let mut types = vec![ColumnType::Null; columns.len()];
        for (_, fields) in &records {
            for (col, cell) in fields.iter().enumerate() {
                if !self.is_null(cell) {
                    types[col] = types[col].unify(ColumnType::of_cell(cell));
                }
            }
        }

        let first_line = records[0].0;
        let mut rows = Vec::with_capacity(records.len());
        for (line, fields) in records {
            let mut row = Vec::with_capacity(fields.len());
            for (col, cell) in fields.into_iter().enumerate() {
                row.push(self.typed_value(cell, types[col], line)?);
            }
            rows.push(row);
        }

        Ok(Batch {
            columns,
            types,
            rows,
            first_line,
        })
    }

    fn typed_value(&self, cell: String, ty: ColumnType, line: u64) -> Result<Value> {
        if self.is_null(&cell) {
            return Ok(Value::Null);
        }
        if ty == ColumnType::Utf8 {
            return Ok(Value::Text(cell));
        }
        Value::parse(&cell, ty).ok_or_else(|| ConvertError::Parse {
            line,
            message: format!("cannot decode '{}' as {}", cell, ty),
        })
    }

    fn is_null(&self, cell: &str) -> bool {
        self.null_values.iter().any(|n| n == cell)
    }
}

impl Iterator for BatchReader {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for BatchReader {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_batches_are_bounded() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "data.csv", "id,name\n1,a\n2,b\n3,c\n4,d\n5,e\n");

        let batches: Vec<Batch> = BatchReader::open(&path, 2)?.collect::<Result<_>>()?;
        let sizes: Vec<usize> = batches.iter().map(Batch::num_rows).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[0].columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(batches[1].first_line(), 4);
        assert_eq!(batches[2].rows()[0], vec![Value::Int(5), Value::from("e")]);
        Ok(())
    }

    #[test]
    fn test_inference_per_batch() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "typed.csv",
            "a,b,c,d,e\n1,1.5,true,x,\n2,2,FALSE,3,\n",
        );

        let mut reader = BatchReader::open(&path, 10)?;
        let batch = reader.next_batch()?.unwrap();
        assert_eq!(
            batch.types(),
            &[
                ColumnType::Int64,
                ColumnType::Float64,
                ColumnType::Boolean,
                ColumnType::Utf8,
                ColumnType::Null,
            ]
        );
        assert_eq!(batch.rows()[1][1], Value::Float(2.0));
        assert_eq!(batch.rows()[1][3], Value::from("3"));
        assert_eq!(batch.rows()[0][4], Value::Null);
        assert!(reader.next_batch()?.is_none());
        Ok(())
    }

    #[test]
    fn test_quoted_multiline_and_blank_lines() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "multi.csv",
            "\u{feff}id,note\r\n1,\"first\nsecond\"\r\n\r\n2,plain\r\n",
        );

        let mut reader = BatchReader::open(&path, 10)?;
        let batch = reader.next_batch()?.unwrap();
        assert_eq!(reader.headers().unwrap()[0], "id");
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.rows()[0][1], Value::from("first\nsecond"));
        assert_eq!(batch.row_map(1).unwrap()["note"], &Value::from("plain"));
        Ok(())
    }

    #[test]
    fn test_field_count_error_has_line() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "bad.csv", "a,b\n1,2\n3\n");

        let mut reader = BatchReader::open(&path, 10).unwrap();
        match reader.next() {
            Some(Err(ConvertError::Parse { line, .. })) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_unterminated_quote() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "open.csv", "a,b\n1,\"never closed\n");

        let err = BatchReader::open(&path, 10)
            .unwrap()
            .next_batch()
            .unwrap_err();
        assert!(matches!(err, ConvertError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_stray_quote_stops_at_record_limit() {
        let dir = TempDir::new().unwrap();
        let mut content = String::from("name,height\nbob,5'10\"\n");
        for i in 0..20_000 {
            content.push_str(&format!("person_{},6'0\n", i));
        }
        let path = write_csv(&dir, "stray.csv", &content);

        let mut reader = BatchReader::open(&path, 100).unwrap().max_record_lines(50);
        match reader.next_batch() {
            Err(ConvertError::Parse { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("50 lines"), "{}", message);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        // Reading stopped at the limit instead of consuming the file
        assert_eq!(reader.line(), 51);
    }

    #[test]
    fn test_record_byte_limit() {
        let dir = TempDir::new().unwrap();
        let long = "x".repeat(64);
        let content = format!("a,b\n1,\"{}\n{}\n{}\"\n", long, long, long);
        let path = write_csv(&dir, "long.csv", &content);

        let err = BatchReader::open(&path, 10)
            .unwrap()
            .max_record_bytes(100)
            .next_batch()
            .unwrap_err();
        assert!(matches!(err, ConvertError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_crlf_inside_quotes_is_kept() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "crlf.csv", "id,note\r\n1,\"a\r\nb\"\r\n2,\"c\nd\"\r\n");

        let batch = BatchReader::open(&path, 10)?.next_batch()?.unwrap();
        assert_eq!(batch.rows()[0][1], Value::from("a\r\nb"));
        assert_eq!(batch.rows()[1][1], Value::from("c\nd"));
        assert_eq!(batch.first_line(), 2);
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_has_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("binary.csv");
        std::fs::write(&path, b"a,b\n1,2\n3,\xff\xfe\n").unwrap();

        let mut reader = BatchReader::open(&path, 10).unwrap();
        match reader.next() {
            Some(Err(ConvertError::Parse { line, message })) => {
                assert_eq!(line, 3);
                assert_eq!(message, "invalid UTF-8");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_duplicate_header() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "dup.csv", "a,a\n1,2\n");

        let err = BatchReader::open(&path, 10)
            .unwrap()
            .next_batch()
            .unwrap_err();
        assert!(matches!(err, ConvertError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_header_only_yields_nothing() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "empty.csv", "a,b\n");
        assert_eq!(BatchReader::open(&path, 10)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_custom_dialect() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "semi.csv", "a;b\n'x;y';NA\n");

        let batch = BatchReader::open(&path, 10)?
            .delimiter(b';')
            .quote_char(b'\'')
            .null_values(["NA"])
            .next_batch()?
            .unwrap();
        assert_eq!(batch.rows()[0], vec![Value::from("x;y"), Value::Null]);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = BatchReader::open("/no/such/file.csv", 10).err().unwrap();
        assert!(matches!(err, ConvertError::SourceNotFound { .. }));
    }

    #[test]
    fn test_batch_from_rows() -> Result<()> {
        let columns: Arc<[String]> = vec!["x".to_string()].into();
        let batch = Batch::from_rows(
            columns.clone(),
            vec![vec![Value::Null], vec![Value::Int(1)], vec![Value::Float(0.5)]],
        )?;
        assert_eq!(batch.types(), &[ColumnType::Float64]);

        let err = Batch::from_rows(columns, vec![vec![Value::Int(1)], vec![Value::from("a")]])
            .unwrap_err();
        assert!(matches!(err, ConvertError::SchemaMismatch { .. }));
        Ok(())
    }
}
