//! Error types for shared value types.

use thiserror::Error;

/// Errors raised while constructing a query geometry.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("polygon needs at least 3 distinct vertices, got {0}")]
    TooFewVertices(usize),

    #[error("non-finite coordinate ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
}

/// Errors raised while parsing timestamps or time windows.
#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("time window start {start} is after stop {stop}")]
    InvertedWindow { start: String, stop: String },
}
