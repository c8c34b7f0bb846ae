//! Error types for rusty_intrastat

use thiserror::Error;

/// Main error type for rusty_intrastat
#[derive(Error, Debug)]
pub enum IntrastatError {
    /// Nothing to work with: empty observation lists, rates absent for a date
    #[error("Missing data: {0}")]
    MissingDataError(String),

    /// Expected fields or columns are absent, or a column name is reserved
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("DataFrame error: {0}")]
    DataFrameError(#[from] polars::error::PolarsError),
}

/// Result type alias for rusty_intrastat operations
pub type Result<T> = std::result::Result<T, IntrastatError>;
