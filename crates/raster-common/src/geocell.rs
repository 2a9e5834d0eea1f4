//! 1°×1° geocell keys and the tile naming scheme.
//!
//! Tile catalogs distribute their index files by the geocell containing
//! the south-west corner, e.g. `n72e129` holds everything between 72°N
//! and 73°N latitude and 129°E and 130°E longitude.
//!
//! Keys are derived by flooring, never truncation:
//!
//! | lon, lat      | geocell   |
//! |---------------|-----------|
//! | -120.3, 61.4  | `n61w121` |
//! | -50.8, 61.0   | `n61w051` |
//! | -5.0, 61.0    | `n61w005` |
//! | 5.0, 61.0     | `n61e005` |

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Integer (longitude, latitude) pair identifying a unit tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeocellKey {
    pub lon: i32,
    pub lat: i32,
}

impl GeocellKey {
    pub fn new(lon: i32, lat: i32) -> Self {
        Self { lon, lat }
    }

    /// Geocell containing the given coordinate.
    pub fn from_coords(lon: f64, lat: f64) -> Self {
        Self {
            lon: lon.floor() as i32,
            lat: lat.floor() as i32,
        }
    }

    /// Every geocell whose unit tile intersects the envelope.
    ///
    /// Covers `floor(min)..ceil(max)` on each axis, longitude-major.
    pub fn covering(envelope: &BoundingBox) -> Vec<GeocellKey> {
        let min_lon = envelope.min_x.floor() as i32;
        let min_lat = envelope.min_y.floor() as i32;
        let max_lon = envelope.max_x.ceil() as i32;
        let max_lat = envelope.max_y.ceil() as i32;

        (min_lon..max_lon)
            .flat_map(|lon| (min_lat..max_lat).map(move |lat| GeocellKey::new(lon, lat)))
            .collect()
    }

    /// Tile name such as `n61w121`.
    pub fn tile_name(&self) -> String {
        format!(
            "{}{:02}{}{:03}",
            if self.lat < 0 { 's' } else { 'n' },
            self.lat.unsigned_abs(),
            if self.lon < 0 { 'w' } else { 'e' },
            self.lon.unsigned_abs()
        )
    }

    /// Path of this geocell's index file under `dir`.
    pub fn tile_path(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(format!("{}.{}", self.tile_name(), extension))
    }

    /// Extent of the unit tile.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.lon as f64,
            self.lat as f64,
            (self.lon + 1) as f64,
            (self.lat + 1) as f64,
        )
    }
}

impl fmt::Display for GeocellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tile_name())
    }
}
