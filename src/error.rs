//! Error types for the load → clean → analyze pipeline.
//!
//! Structural problems (missing file, missing column, unknown format,
//! malformed content) are [`PipelineError`]s and abort the operation.
//! Data-level anomalies inside a bulk cleaning step are not errors; they are
//! recorded as [`CleaningWarning`](crate::data::report::CleaningWarning)s.

use std::path::PathBuf;

use thiserror::Error;

use crate::data::loader::FileFormat;

/// Errors surfaced to the caller by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input file does not exist.
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A named column is not present in the table.
    #[error("Column '{name}' not found")]
    ColumnNotFound { name: String },

    /// File extension does not map to a supported format.
    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },

    /// File content could not be decoded.
    #[error("Error loading {format}: {message}")]
    Parse { format: FileFormat, message: String },

    /// Operation called before the state it depends on exists.
    #[error("{0}")]
    State(String),

    /// A column with this name already exists.
    #[error("Column '{name}' already exists")]
    DuplicateColumn { name: String },

    /// A column's length disagrees with the table's row count.
    #[error("Column '{name}' has {actual} rows, table has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Writing a report failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialising a report failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn column_not_found(name: &str) -> Self {
        PipelineError::ColumnNotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn parse(format: FileFormat, message: impl ToString) -> Self {
        PipelineError::Parse {
            format,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_item() {
        let err = PipelineError::NotFound {
            path: PathBuf::from("data/missing.csv"),
        };
        assert_eq!(err.to_string(), "File not found: data/missing.csv");

        let err = PipelineError::column_not_found("age");
        assert_eq!(err.to_string(), "Column 'age' not found");

        let err = PipelineError::parse(FileFormat::Json, "expected value at line 1");
        assert_eq!(err.to_string(), "Error loading JSON: expected value at line 1");
    }
}
