//! CSV error types

use thiserror::Error;

/// Result type for CSV operations
pub type CsvResult<T> = std::result::Result<T, CsvError>;

/// Errors that can occur during CSV operations
#[derive(Debug, Error)]
pub enum CsvError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV library error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed record
    #[error("Parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    /// Table construction error
    #[error("Table error: {0}")]
    Table(#[from] tabula_core::Error),
}
