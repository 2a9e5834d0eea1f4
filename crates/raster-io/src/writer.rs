//! Zarr V3 raster writer.
//!
//! Used to materialize rasters (tile mosaics, fixtures, rasterized masks)
//! in the layout [`crate::zarr::ZarrDataset`] reads back.

use std::path::Path;
use std::sync::Arc;

use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::config::{ZarrCompression, ZarrWriterConfig};
use crate::dataset::RasterInfo;
use crate::error::{IoError, Result};

/// Result of writing a Zarr raster.
#[derive(Debug, Clone)]
pub struct ZarrWriteResult {
    /// Chunk dimensions actually used (clamped to the raster size).
    pub chunk_shape: (usize, usize),
    /// Uncompressed bytes written.
    pub bytes_written: u64,
}

/// Writer for 2D `float32` Zarr rasters.
pub struct ZarrRasterWriter {
    config: ZarrWriterConfig,
}

impl Default for ZarrRasterWriter {
    fn default() -> Self {
        Self::new(ZarrWriterConfig::default())
    }
}

impl ZarrRasterWriter {
    pub fn new(config: ZarrWriterConfig) -> Self {
        Self { config }
    }

    /// Write `data` (row-major, top-to-bottom) as a raster at `path`.
    pub fn write(&self, path: &Path, data: &[f32], info: &RasterInfo) -> Result<ZarrWriteResult> {
        let path_str = path.display().to_string();

        self.config
            .validate()
            .map_err(|msg| IoError::write_failed(&path_str, msg))?;
        info.validate()
            .map_err(|msg| IoError::write_failed(&path_str, msg))?;
        if data.len() != info.width * info.height {
            return Err(IoError::write_failed(
                &path_str,
                format!(
                    "data length {} does not match {}x{}",
                    data.len(),
                    info.width,
                    info.height
                ),
            ));
        }

        let chunk_w = self.config.chunk_size.min(info.width);
        let chunk_h = self.config.chunk_size.min(info.height);

        std::fs::create_dir_all(path)
            .map_err(|e| IoError::write_failed(&path_str, e.to_string()))?;
        let store = FilesystemStore::new(path)
            .map_err(|e| IoError::write_failed(&path_str, e.to_string()))?;

        let mut attrs = serde_json::Map::new();
        attrs.insert(
            "geotransform".to_string(),
            serde_json::json!(info.geotransform.to_vec()),
        );
        attrs.insert("crs".to_string(), serde_json::json!(info.crs));
        if let Some(nodata) = info.nodata {
            attrs.insert("nodata".to_string(), serde_json::json!(nodata));
        }

        let chunk_grid: zarrs::array::ChunkGrid = vec![chunk_h as u64, chunk_w as u64]
            .try_into()
            .map_err(|e| IoError::write_failed(&path_str, format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(
            vec![info.height as u64, info.width as u64], // shape [rows, cols]
            DataType::Float32,
            chunk_grid,
            FillValue::from(f32::NAN),
        );
        let mut builder = binding.attributes(attrs);

        if self.config.compression != ZarrCompression::None {
            let codec = self.create_compression_codec(&path_str)?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(Arc::new(store), "/")
            .map_err(|e| IoError::write_failed(&path_str, e.to_string()))?;

        array
            .store_metadata()
            .map_err(|e| IoError::write_failed(&path_str, e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(
            vec![0, 0],
            vec![info.height as u64, info.width as u64],
        )
        .map_err(|e| IoError::write_failed(&path_str, e.to_string()))?;

        array
            .store_array_subset_elements(&subset, data)
            .map_err(|e| IoError::write_failed(&path_str, e.to_string()))?;

        tracing::debug!(
            path = %path_str,
            width = info.width,
            height = info.height,
            compression = %self.config.compression,
            "Wrote zarr raster"
        );

        Ok(ZarrWriteResult {
            chunk_shape: (chunk_w, chunk_h),
            bytes_written: std::mem::size_of_val(data) as u64,
        })
    }

    fn create_compression_codec(
        &self,
        path: &str,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| IoError::write_failed(path, "invalid compression level"))?;

        let shuffle = if self.config.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };
        // typesize is required when shuffle is enabled
        let typesize = self.config.shuffle.then_some(4);

        let compressor = match self.config.compression {
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd | ZarrCompression::None => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| IoError::write_failed(path, e.to_string()))?;

        Ok(Arc::new(codec))
    }
}
