use polars::error::PolarsError;
use thiserror::Error;

pub type DayAheadResult<T> = Result<T, DayAheadError>;

#[derive(Debug, Error)]
pub enum DayAheadError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors related to parsing, schema checks and data frame transformations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to parse price in column '{column}' at row {row}: '{value}'")]
    ParsePrice {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Failed to parse date in column '{column}' at row {row}: '{value}'")]
    ParseDate {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Failed to parse timestamp in column '{column}' at row {row}: '{value}'")]
    ParseTimestamp {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Missing value in key column '{column}' at row {row}")]
    MissingKey { column: String, row: usize },

    #[error("Missing column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

/// Errors related to file I/O and serialization.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),

    #[error("Failed to write data: {0}")]
    WriteFailed(String),
}

/// Errors related to pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid tolerance {0}: must be finite and positive")]
    InvalidTolerance(f64),

    #[error("Missing commodity source for '{0}'")]
    MissingCommodity(String),

    #[error("Invalid pipeline configuration: {0}")]
    Invalid(String),
}

pub(crate) fn frame_error(stage: &str, e: PolarsError) -> DayAheadError {
    DayAheadError::Data(DataError::DataFrame(format!("Error while {stage}: {e}")))
}
