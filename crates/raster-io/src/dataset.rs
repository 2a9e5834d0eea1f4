//! Opened raster datasets and the I/O collaborator that produces them.
//!
//! Datasets are read-only once opened. Implementations must tolerate
//! concurrent reads from many threads without external locking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use raster_common::BoundingBox;

use crate::error::{IoError, Result};

/// Affine geotransform in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, -pixel_height]`.
pub type GeoTransform = [f64; 6];

/// Georeferencing and shape of an opened raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    pub geotransform: GeoTransform,
    /// Spatial reference, e.g. `EPSG:4326`.
    pub crs: String,
    /// Value marking missing data. NaN is always treated as missing.
    pub nodata: Option<f64>,
}

impl RasterInfo {
    /// North-up raster whose upper-left corner is `(min_x, max_y)`.
    pub fn north_up(min_x: f64, max_y: f64, cell_size: f64, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            geotransform: [min_x, cell_size, 0.0, max_y, 0.0, -cell_size],
            crs: "EPSG:4326".to_string(),
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = crs.into();
        self
    }

    /// Reject rotated or degenerate georeferencing.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let gt = &self.geotransform;
        if self.width == 0 || self.height == 0 {
            return Err(format!("empty raster {}x{}", self.width, self.height));
        }
        if gt.iter().any(|v| !v.is_finite()) {
            return Err("geotransform contains non-finite values".to_string());
        }
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err("rotated geotransforms are not supported".to_string());
        }
        if gt[1] <= 0.0 || gt[5] >= 0.0 {
            return Err(format!(
                "geotransform must be north-up, got pixel size ({}, {})",
                gt[1], gt[5]
            ));
        }
        Ok(())
    }

    /// Pixel size as (x, y), both positive.
    pub fn cell_size(&self) -> (f64, f64) {
        (self.geotransform[1], -self.geotransform[5])
    }

    /// Extent covered by the raster.
    pub fn bbox(&self) -> BoundingBox {
        let (cx, cy) = self.cell_size();
        let min_x = self.geotransform[0];
        let max_y = self.geotransform[3];
        BoundingBox::new(
            min_x,
            max_y - cy * self.height as f64,
            min_x + cx * self.width as f64,
            max_y,
        )
    }

    /// `(row, col)` of the pixel containing `(x, y)`, or `None` when outside.
    ///
    /// Points on the right or bottom edge fall into the last column/row.
    pub fn pixel_for(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !x.is_finite() || !y.is_finite() || !self.bbox().contains_point(x, y) {
            return None;
        }
        let (cx, cy) = self.cell_size();
        let col = ((x - self.geotransform[0]) / cx).floor() as usize;
        let row = ((self.geotransform[3] - y) / cy).floor() as usize;
        Some((row.min(self.height - 1), col.min(self.width - 1)))
    }

    /// Centre coordinate of a pixel.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let (cx, cy) = self.cell_size();
        (
            self.geotransform[0] + (col as f64 + 0.5) * cx,
            self.geotransform[3] - (row as f64 + 0.5) * cy,
        )
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Check that a pixel window lies inside the raster.
    pub fn check_window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<()> {
        let fits = row
            .checked_add(rows)
            .is_some_and(|end| end <= self.height)
            && col.checked_add(cols).is_some_and(|end| end <= self.width);
        if fits {
            Ok(())
        } else {
            Err(IoError::OutOfRange {
                row,
                col,
                rows,
                cols,
                height: self.height,
                width: self.width,
            })
        }
    }
}

/// An opened raster dataset.
pub trait RasterDataset: Send + Sync {
    /// Path the dataset was opened from.
    fn path(&self) -> &str;

    fn info(&self) -> &RasterInfo;

    /// Read a single pixel.
    fn read_pixel(&self, row: usize, col: usize) -> Result<f64> {
        Ok(self.read_window(row, col, 1, 1)?[0])
    }

    /// Read a window in row-major order.
    fn read_window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<Vec<f64>>;
}

/// Opens raster datasets by path.
pub trait RasterIo: Send + Sync {
    fn open(&self, path: &str) -> Result<Arc<dyn RasterDataset>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_degree() -> RasterInfo {
        RasterInfo::north_up(-121.0, 62.0, 0.1, 10, 10)
    }

    #[test]
    fn test_bbox_from_geotransform() {
        let bbox = one_degree().bbox();
        assert!((bbox.min_x + 121.0).abs() < 1e-9);
        assert!((bbox.max_x + 120.0).abs() < 1e-9);
        assert!((bbox.min_y - 61.0).abs() < 1e-9);
        assert!((bbox.max_y - 62.0).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_for() {
        let info = one_degree();
        assert_eq!(info.pixel_for(-120.95, 61.95), Some((0, 0)));
        assert_eq!(info.pixel_for(-120.35, 61.45), Some((5, 6)));
        // Right/bottom edges clamp into the raster
        assert_eq!(info.pixel_for(-120.0, 61.0), Some((9, 9)));
        assert_eq!(info.pixel_for(-119.9, 61.5), None);
        assert_eq!(info.pixel_for(f64::NAN, 61.5), None);
    }

    #[test]
    fn test_validate_rejects_rotation() {
        let mut info = one_degree();
        assert!(info.validate().is_ok());
        info.geotransform[2] = 0.01;
        assert!(info.validate().is_err());

        let south_up = RasterInfo {
            geotransform: [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            ..one_degree()
        };
        assert!(south_up.validate().is_err());
    }

    #[test]
    fn test_nodata() {
        let info = one_degree().with_nodata(-9999.0);
        assert!(info.is_nodata(-9999.0));
        assert!(info.is_nodata(f64::NAN));
        assert!(!info.is_nodata(0.0));
    }

    #[test]
    fn test_check_window() {
        let info = one_degree();
        assert!(info.check_window(0, 0, 10, 10).is_ok());
        assert!(info.check_window(5, 5, 5, 6).is_err());
        assert!(info.check_window(usize::MAX, 0, 2, 1).is_err());
    }
}
