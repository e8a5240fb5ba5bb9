//! Error types for gridcalc core.

use thiserror::Error;

/// Errors from loading or writing grids. Formula problems are never errors
/// at this level; they are reported per cell in an `Evaluation`.
#[derive(Error, Debug)]
pub enum GridcalcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error at line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("CSV file is empty")]
    EmptyCsv,
}

pub type Result<T> = std::result::Result<T, GridcalcError>;
