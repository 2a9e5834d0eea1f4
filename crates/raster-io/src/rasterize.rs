//! Polygon rasterization onto a north-up grid.
//!
//! A pixel is burned when its centre lies inside a polygon (even-odd rule
//! across the polygon's rings, so holes stay unburned). Polygons are burned
//! independently; overlapping polygons do not cancel.

use geo::{Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};

use raster_common::BoundingBox;

use crate::dataset::RasterInfo;

/// Target grid of a rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnGrid {
    /// Left edge.
    pub min_x: f64,
    /// Top edge.
    pub max_y: f64,
    pub cell_size: f64,
    pub cols: usize,
    pub rows: usize,
}

impl BurnGrid {
    /// Grid covering `extent` with square cells of `cell_size`.
    ///
    /// Column and row counts truncate, so a partial trailing cell is dropped.
    pub fn covering(extent: &BoundingBox, cell_size: f64) -> Self {
        Self {
            min_x: extent.min_x,
            max_y: extent.max_y,
            cell_size,
            cols: (extent.width() / cell_size) as usize,
            rows: (extent.height() / cell_size) as usize,
        }
    }

    pub fn raster_info(&self) -> RasterInfo {
        RasterInfo::north_up(self.min_x, self.max_y, self.cell_size, self.cols, self.rows)
    }
}

/// Burn `geometries` into a `rows x cols` buffer (row-major, top row first).
pub fn rasterize(geometries: &[Geometry<f64>], grid: &BurnGrid, burn: u8, background: u8) -> Vec<u8> {
    let mut out = vec![background; grid.cols * grid.rows];
    if grid.cols == 0 || grid.rows == 0 {
        return out;
    }

    let mut polygons = Vec::new();
    for geometry in geometries {
        collect_polygons(geometry, &mut polygons);
    }

    let mut crossings = Vec::new();
    for polygon in polygons {
        for row in 0..grid.rows {
            let y = grid.max_y - (row as f64 + 0.5) * grid.cell_size;

            crossings.clear();
            ring_crossings(polygon.exterior(), y, &mut crossings);
            for interior in polygon.interiors() {
                ring_crossings(interior, y, &mut crossings);
            }
            crossings.sort_by(f64::total_cmp);

            let line = &mut out[row * grid.cols..(row + 1) * grid.cols];
            for span in crossings.chunks_exact(2) {
                // Columns whose centre lies in [span[0], span[1])
                let first = ((span[0] - grid.min_x) / grid.cell_size - 0.5).ceil();
                let last = ((span[1] - grid.min_x) / grid.cell_size - 0.5).ceil();
                let first = first.clamp(0.0, grid.cols as f64) as usize;
                let last = last.clamp(0.0, grid.cols as f64) as usize;
                if last > first {
                    line[first..last].fill(burn);
                }
            }
        }
    }

    out
}

fn collect_polygons<'a>(geometry: &'a Geometry<f64>, out: &mut Vec<&'a Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0.iter() {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

/// X positions where the horizontal line at `y` crosses the ring.
fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for line in ring.lines() {
        let (a, b) = (line.start, line.end);
        if (a.y > y) != (b.y > y) {
            out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}
