//! Zarr V3 raster reader.
//!
//! Rasters are 2D `float32` arrays stored `[rows, cols]` with the
//! georeferencing kept in the array attributes:
//!
//! ```json
//! { "geotransform": [-121.0, 0.1, 0.0, 62.0, 0.0, -0.1],
//!   "crs": "EPSG:4326",
//!   "nodata": -9999.0 }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::dataset::{RasterDataset, RasterInfo, RasterIo};
use crate::error::{IoError, Result};

/// A Zarr raster opened from the local filesystem.
pub struct ZarrDataset {
    array: Array<FilesystemStore>,
    path: String,
    info: RasterInfo,
}

impl ZarrDataset {
    /// Open a Zarr raster rooted at `path`.
    pub fn open(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(IoError::NotFound(path.to_string()));
        }

        let store =
            FilesystemStore::new(path).map_err(|e| IoError::open_failed(path, e.to_string()))?;
        let array = Array::open(Arc::new(store), "/")
            .map_err(|e| IoError::open_failed(path, e.to_string()))?;

        let info = Self::extract_info(&array, path)?;
        info.validate()
            .map_err(|msg| IoError::invalid_metadata(path, msg))?;

        tracing::debug!(
            path = %path,
            width = info.width,
            height = info.height,
            crs = %info.crs,
            "Opened zarr raster"
        );

        Ok(Self {
            array,
            path: path.to_string(),
            info,
        })
    }

    /// Extract georeferencing from the array attributes.
    fn extract_info(array: &Array<FilesystemStore>, path: &str) -> Result<RasterInfo> {
        let attrs = array.attributes();
        let shape = array.shape();

        if shape.len() != 2 {
            return Err(IoError::invalid_metadata(
                path,
                format!("expected a 2D array, got {} dimensions", shape.len()),
            ));
        }

        let geotransform = attrs
            .get("geotransform")
            .and_then(|v| v.as_array())
            .filter(|arr| arr.len() == 6)
            .and_then(|arr| {
                let mut gt = [0.0f64; 6];
                for (slot, value) in gt.iter_mut().zip(arr) {
                    *slot = value.as_f64()?;
                }
                Some(gt)
            })
            .ok_or_else(|| IoError::invalid_metadata(path, "missing or malformed geotransform"))?;

        let crs = attrs
            .get("crs")
            .and_then(|v| v.as_str())
            .unwrap_or("EPSG:4326")
            .to_string();

        // Explicit nodata wins over the array fill value
        let fill_value = array
            .fill_value()
            .as_ne_bytes()
            .try_into()
            .map(f32::from_ne_bytes)
            .unwrap_or(f32::NAN);
        let nodata = attrs
            .get("nodata")
            .and_then(|v| v.as_f64())
            .or_else(|| (!fill_value.is_nan()).then_some(fill_value as f64));

        Ok(RasterInfo {
            width: shape[1] as usize,
            height: shape[0] as usize,
            geotransform,
            crs,
            nodata,
        })
    }
}

impl RasterDataset for ZarrDataset {
    fn path(&self) -> &str {
        &self.path
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<Vec<f64>> {
        self.info.check_window(row, col, rows, cols)?;

        // Zarr uses [row, col] indexing
        let subset = ArraySubset::new_with_start_shape(
            vec![row as u64, col as u64],
            vec![rows as u64, cols as u64],
        )
        .map_err(|e| IoError::read_failed(&self.path, e.to_string()))?;

        let data: Vec<f32> = self
            .array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| IoError::read_failed(&self.path, e.to_string()))?;

        Ok(data.into_iter().map(f64::from).collect())
    }
}

/// [`RasterIo`] over Zarr rasters on the local filesystem.
#[derive(Debug, Default)]
pub struct ZarrRasterIo {
    opens: AtomicU64,
}

impl ZarrRasterIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open attempts so far.
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }
}

impl RasterIo for ZarrRasterIo {
    fn open(&self, path: &str) -> Result<Arc<dyn RasterDataset>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        let dataset = ZarrDataset::open(path)?;
        Ok(Arc::new(dataset))
    }
}
