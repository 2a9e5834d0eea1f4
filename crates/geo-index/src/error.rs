//! Error types for index loading, group resolution and mask construction.

use raster_common::GeometryError;
use raster_io::IoError;
use thiserror::Error;

/// Errors produced by the geo-index layer.
#[derive(Error, Debug)]
pub enum IndexError {
    /// No covering tile yielded any index feature.
    #[error("no index data for the area of interest ({tiles} tiles tried)")]
    IndexUnavailable { tiles: usize },

    /// The provider marker token is missing from a file reference.
    #[error("marker '{marker}' not found in file reference '{reference}'")]
    PathResolution { marker: String, reference: String },

    /// Every candidate feature was filtered out or failed to resolve.
    #[error("no rasters found")]
    GroupResolutionEmpty,

    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("invalid cell size: {0}")]
    InvalidCellSize(f64),

    #[error("invalid timestamps for {feature}: {message}")]
    InvalidTimestamps { feature: String, message: String },

    #[error("invalid query geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] IoError),
}

impl IndexError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_boundary(msg: impl Into<String>) -> Self {
        Self::InvalidBoundary(msg.into())
    }

    /// True for the recoverable "nothing here" outcomes.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::IndexUnavailable { .. } | Self::GroupResolutionEmpty)
    }
}

impl From<serde_yaml::Error> for IndexError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for geo-index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
