//! Error types for the raster/vector I/O layer.

use thiserror::Error;

/// Errors that can occur while opening or reading datasets.
#[derive(Error, Debug)]
pub enum IoError {
    /// The dataset or layer does not exist.
    #[error("dataset not found: {0}")]
    NotFound(String),

    /// Failed to open the dataset.
    #[error("failed to open {path}: {message}")]
    OpenFailed { path: String, message: String },

    /// Failed to read data from the dataset.
    #[error("failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },

    /// The dataset carries unusable metadata.
    #[error("invalid metadata in {path}: {message}")]
    InvalidMetadata { path: String, message: String },

    /// A vector document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Failed to write a dataset.
    #[error("failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    /// A pixel window falls outside the raster.
    #[error("window ({row}, {col}) + ({rows} x {cols}) is outside a {height} x {width} raster")]
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
        height: usize,
        width: usize,
    },
}

impl IoError {
    /// Create an OpenFailed error.
    pub fn open_failed(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a ReadFailed error.
    pub fn read_failed(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a WriteFailed error.
    pub fn write_failed(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// True when the dataset simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for IoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, IoError>;
