//! Error types for CSV → Parquet conversion

use crate::types::ColumnType;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors produced by a conversion run
///
/// Every error is fatal to the run. The variants carry enough context (path,
/// line, column) to diagnose the failure without re-running.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The source file did not exist when the run started
    #[error("Source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// The source had a header (or nothing at all) but no data rows
    #[error("Source file has no data rows: {}", path.display())]
    EmptySource { path: PathBuf },

    /// A record could not be decoded into typed values
    #[error("Parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A batch disagrees with the schema locked from the first batch
    #[error("Schema mismatch in column '{column}': expected {expected}, found {found}")]
    SchemaMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// The destination (or source) could not be opened, written or finalized
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Internal invariant violation, e.g. writing to a closed writer
    #[error("Resource error: {0}")]
    Resource(String),

    /// Conversion parameters are unusable
    #[error("Invalid conversion job: {0}")]
    InvalidJob(String),
}

/// Coarse error category, for callers that only care about the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceNotFound,
    EmptySource,
    Parse,
    SchemaMismatch,
    Io,
    Resource,
    InvalidJob,
}

impl ConvertError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            ConvertError::EmptySource { .. } => ErrorKind::EmptySource,
            ConvertError::Parse { .. } => ErrorKind::Parse,
            ConvertError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            ConvertError::Io { .. } | ConvertError::Parquet(_) | ConvertError::Arrow(_) => {
                ErrorKind::Io
            }
            ConvertError::Resource(_) => ErrorKind::Resource,
            ConvertError::InvalidJob(_) => ErrorKind::InvalidJob,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_column() {
        let err = ConvertError::SchemaMismatch {
            column: "age".to_string(),
            expected: ColumnType::Int64,
            found: ColumnType::Utf8,
        };
        assert_eq!(
            err.to_string(),
            "Schema mismatch in column 'age': expected Int64, found Utf8"
        );
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_library_errors_are_io_kind() {
        let err: ConvertError =
            parquet::errors::ParquetError::General("footer".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Io);

        let err = ConvertError::io("out.parquet", std::io::ErrorKind::PermissionDenied.into());
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("out.parquet"));
    }
}
