//! Vector boundary masks.
//!
//! A boundary is rasterized once, at construction, into a byte grid so
//! containment tests become a bounds check plus one pixel lookup. The mask
//! is immutable afterwards and safe to share across threads.

use geo::{Geometry, HasDimensions};

use raster_common::BoundingBox;
use raster_io::{
    parse_geojson, rasterize, BurnGrid, IoError, RasterDataset, RasterInfo, Result as IoResult,
};

use crate::error::{IndexError, Result};

/// Pixel value inside the boundary.
pub const MASK_ON: u8 = 1;
/// Background pixel value.
pub const MASK_NODATA: u8 = 0;

/// Upper bound on mask size, to reject absurd cell sizes early.
const MAX_MASK_PIXELS: usize = 1 << 30;

/// A rasterized boundary.
pub struct MaskRaster {
    path: String,
    grid: BurnGrid,
    info: RasterInfo,
    pixels: Vec<u8>,
}

impl MaskRaster {
    /// True when `(lon, lat)` falls on an "on" pixel. Height is ignored.
    pub fn includes(&self, lon: f64, lat: f64, _height: f64) -> bool {
        if !self.info.bbox().contains_point(lon, lat) {
            return false;
        }
        let row = ((self.grid.max_y - lat) / self.grid.cell_size).floor();
        let col = ((lon - self.grid.min_x) / self.grid.cell_size).floor();
        if row < 0.0 || col < 0.0 {
            return false;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.grid.rows || col >= self.grid.cols {
            return false;
        }
        self.pixels[row * self.grid.cols + col] == MASK_ON
    }

    pub fn bbox(&self) -> BoundingBox {
        self.info.bbox()
    }

    pub fn cell_size(&self) -> f64 {
        self.grid.cell_size
    }

    pub fn rows(&self) -> usize {
        self.grid.rows
    }

    pub fn cols(&self) -> usize {
        self.grid.cols
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of "on" pixels.
    pub fn on_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p == MASK_ON).count()
    }
}

impl std::fmt::Debug for MaskRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskRaster")
            .field("path", &self.path)
            .field("grid", &self.grid)
            .field("on", &self.on_count())
            .finish_non_exhaustive()
    }
}

impl RasterDataset for MaskRaster {
    fn path(&self) -> &str {
        &self.path
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&self, row: usize, col: usize, rows: usize, cols: usize) -> IoResult<Vec<f64>> {
        self.info.check_window(row, col, rows, cols)?;
        let mut out = Vec::with_capacity(rows * cols);
        for r in row..row + rows {
            let start = r * self.grid.cols + col;
            out.extend(self.pixels[start..start + cols].iter().map(|&p| f64::from(p)));
        }
        Ok(out)
    }
}

/// Builds [`MaskRaster`]s from vector boundaries.
pub struct MaskRasterBuilder;

impl MaskRasterBuilder {
    /// Rasterize `boundary` with square cells of `cell_size`.
    pub fn build(path: &str, boundary: &[Geometry<f64>], cell_size: f64) -> Result<MaskRaster> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(IndexError::InvalidCellSize(cell_size));
        }

        let polygons: Vec<Geometry<f64>> = boundary
            .iter()
            .filter(|g| {
                matches!(g, Geometry::Polygon(_) | Geometry::MultiPolygon(_)) && !g.is_empty()
            })
            .cloned()
            .collect();
        if polygons.is_empty() {
            return Err(IndexError::invalid_boundary("no polygon geometry"));
        }

        let extent = envelope(&polygons)
            .filter(|e| e.width() > 0.0 && e.height() > 0.0)
            .ok_or_else(|| IndexError::invalid_boundary("boundary has no area"))?;

        let grid = BurnGrid::covering(&extent, cell_size);
        let pixels_needed = grid.cols.checked_mul(grid.rows).unwrap_or(usize::MAX);
        if grid.cols == 0 || grid.rows == 0 || pixels_needed > MAX_MASK_PIXELS {
            return Err(IndexError::InvalidCellSize(cell_size));
        }

        let pixels = rasterize(&polygons, &grid, MASK_ON, MASK_NODATA);
        let info = grid.raster_info().with_nodata(f64::from(MASK_NODATA));

        tracing::debug!(
            path = %path,
            cols = grid.cols,
            rows = grid.rows,
            cell_size,
            "Built mask raster"
        );

        Ok(MaskRaster {
            path: path.to_string(),
            grid,
            info,
            pixels,
        })
    }

    /// Parse a GeoJSON boundary document and rasterize it.
    pub fn build_from_geojson(path: &str, geojson: &str, cell_size: f64) -> Result<MaskRaster> {
        let layer = parse_geojson(geojson).map_err(|e| match e {
            IoError::Parse(msg) => IndexError::InvalidBoundary(msg),
            other => IndexError::Io(other),
        })?;
        Self::build(path, &layer.geometries(), cell_size)
    }
}

fn envelope(geometries: &[Geometry<f64>]) -> Option<BoundingBox> {
    use geo::BoundingRect;

    geometries
        .iter()
        .filter_map(|g| g.bounding_rect())
        .map(|r| BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
        .reduce(|a, b| {
            BoundingBox::new(
                a.min_x.min(b.min_x),
                a.min_y.min(b.min_y),
                a.max_x.max(b.max_x),
                a.max_y.max(b.max_y),
            )
        })
}
