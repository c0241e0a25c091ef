//! Error types for the energymodel application.

use thiserror::Error;

/// Errors that can occur when loading patient logs from a workbook.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("cannot read file: {0}")]
    CannotRead(String),

    #[error("invalid Excel format: {0}")]
    InvalidFormat(String),

    #[error("missing required column in sheet '{sheet}': {column}")]
    MissingColumn { sheet: String, column: String },

    #[error("invalid date format in row {row}: {value}")]
    InvalidDate { row: usize, value: String },

    #[error("invalid {column} value in row {row}: {value}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("unknown sex in row {row}: {value}")]
    UnknownSex { row: usize, value: String },

    #[error("unknown activity level in row {row}: {value}")]
    UnknownActivityLevel { row: usize, value: String },
}
