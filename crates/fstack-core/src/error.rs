//! Error types for fstack-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fstack-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structurally invalid delimited text
    #[error("failed to parse '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// JSON data file could not be parsed
    #[error("JSON error in '{path}': {source}")]
    JsonData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON data file parsed but is not a table
    #[error("unsupported JSON layout in '{path}': {message}")]
    JsonShape { path: PathBuf, message: String },

    /// Workbook could not be opened or a sheet could not be read
    #[error("Excel error in '{path}': {source}")]
    Excel {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    /// Text could not be decoded with the requested encoding
    #[error("'{path}' is not valid {encoding}")]
    Decode { path: PathBuf, encoding: String },

    /// Encoding label not recognised
    #[error("unknown text encoding '{0}'")]
    UnknownEncoding(String),

    /// Delimiter could not be detected in a plain-text file
    #[error("could not determine delimiter of '{path}': {reason}")]
    Delimiter { path: PathBuf, reason: String },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Invalid file name pattern or filter regex
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Column referenced by a filter, projection or aggregate does not exist
    #[error("column '{column}' not found in '{table}'")]
    ColumnNotFound { column: String, table: String },

    /// Stack selection refers to a table that was never loaded
    #[error("table index {index} out of range ({len} tables loaded)")]
    TableIndexOutOfRange { index: usize, len: usize },

    /// Stack called without shared columns and without aggregate columns
    #[error("must supply shared columns to stack, or aggregate columns for a scalar summary")]
    NothingToStack,

    /// Aggregate function applied to values it cannot reduce
    #[error("cannot apply '{function}' to non-numeric value '{value}' in column '{column}'")]
    AggregateType {
        column: String,
        function: String,
        value: String,
    },

    /// Grouping or aggregation failed inside polars
    #[error("aggregation failed: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
