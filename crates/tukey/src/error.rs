//! Errors raised by parsing, outlier treatment and the statistics.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::ColumnType;

/// Everything that can fail in this crate.
///
/// Soft conditions (skipped columns, small samples) are warnings, not errors.
#[derive(Debug, Error)]
pub enum TukeyError {
    #[error("Cannot read or write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A raw value that does not fit its column type; positions are zero based.
    #[error("Invalid value at row {row}, column {column}: {message}")]
    Parse {
        row: usize,
        column: usize,
        message: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No data: {0}")]
    EmptyData(String),

    /// Invalid configuration, raised before any row is processed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured column does not exist in the table.
    #[error("Column '{0}' not found in the input table")]
    ColumnNotFound(String),

    /// A column has a type the operation cannot handle.
    #[error("Column '{column}' has unsupported type {found}: {message}")]
    UnsupportedColumnType {
        column: String,
        found: ColumnType,
        message: String,
    },

    /// Too few observations for a statistical routine.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The caller cancelled the operation.
    #[error("Execution cancelled")]
    Cancelled,

    /// Malformed binary model or state blob.
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TukeyError>;
