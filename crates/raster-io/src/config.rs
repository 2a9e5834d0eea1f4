//! Configuration for the Zarr raster writer.

use serde::{Deserialize, Serialize};

/// Settings used when writing Zarr rasters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZarrWriterConfig {
    /// Chunk dimension (square chunks).
    pub chunk_size: usize,

    /// Compression codec.
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,
}

impl Default for ZarrWriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            compression: ZarrCompression::BloscZstd,
            compression_level: 1,
            shuffle: true,
        }
    }
}

impl ZarrWriterConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_ZARR_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("RASTER_ZARR_COMPRESSION") {
            config.compression = ZarrCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("RASTER_ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("RASTER_ZARR_SHUFFLE") {
            config.shuffle = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("compression_level must be 1-9".to_string());
        }

        Ok(())
    }
}

/// Compression codec for Zarr files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZarrCompression {
    None,
    BloscLz4,
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive), defaulting to Blosc/Zstd.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ZarrWriterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ZarrWriterConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ZarrWriterConfig {
            compression_level: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!(ZarrCompression::from_str("NONE"), ZarrCompression::None);
        assert_eq!(ZarrCompression::from_str("lz4"), ZarrCompression::BloscLz4);
        assert_eq!(ZarrCompression::from_str("unknown"), ZarrCompression::BloscZstd);
    }
}
