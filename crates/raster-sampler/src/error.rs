//! Error types for sampling and query sessions.

use geo_index::IndexError;
use raster_io::IoError;
use thiserror::Error;

/// Errors produced while sampling raster groups.
#[derive(Error, Debug)]
pub enum SamplerError {
    /// The point lies outside every layer of the group.
    #[error("point ({lon}, {lat}) is outside every layer of group {group}")]
    OutOfBounds { group: String, lon: f64, lat: f64 },

    /// A requested band (or an index input) is not in the provider's catalog.
    /// No layer of the group could be opened this session.
    #[error("no layer of group {group} could be opened")]
    Unusable { group: String },

    #[error("band not found: {0}")]
    BandNotFound(String),

    #[error("unknown index: {0}")]
    UnknownIndex(String),

    #[error("failed to build sampling pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Result type for sampler operations.
pub type Result<T> = std::result::Result<T, SamplerError>;

/// Coarse classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Valid request, nothing to return.
    Empty,
    /// The request was rejected before any I/O.
    Rejected,
    /// I/O or configuration defect.
    Fault,
}

/// Errors surfaced to the caller of a query session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no index data for the area of interest")]
    IndexUnavailable,

    #[error("no rasters found")]
    NoRasters,

    #[error("band not found: {0}")]
    BandNotFound(String),

    #[error("unknown index: {0}")]
    UnknownIndex(String),

    #[error("invalid query geometry: {0}")]
    InvalidGeometry(String),

    #[error("session cancelled")]
    Cancelled,

    #[error("{0}")]
    Fault(String),
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::IndexUnavailable | Self::NoRasters | Self::Cancelled => ErrorClass::Empty,
            Self::BandNotFound(_) | Self::UnknownIndex(_) | Self::InvalidGeometry(_) => {
                ErrorClass::Rejected
            }
            Self::Fault(_) => ErrorClass::Fault,
        }
    }

    /// Create a Fault error.
    pub fn fault(msg: impl Into<String>) -> Self {
        Self::Fault(msg.into())
    }
}

impl From<IndexError> for SessionError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::IndexUnavailable { .. } => Self::IndexUnavailable,
            IndexError::GroupResolutionEmpty => Self::NoRasters,
            IndexError::InvalidGeometry(e) => Self::InvalidGeometry(e.to_string()),
            other => Self::Fault(other.to_string()),
        }
    }
}

impl From<SamplerError> for SessionError {
    fn from(err: SamplerError) -> Self {
        match err {
            SamplerError::BandNotFound(band) => Self::BandNotFound(band),
            SamplerError::UnknownIndex(index) => Self::UnknownIndex(index),
            other => Self::Fault(other.to_string()),
        }
    }
}
