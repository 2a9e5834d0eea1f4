//! Test fixtures: on-disk tile catalogs and rasters.
//!
//! A strip catalog on disk looks like:
//!
//! ```text
//! <root>/arcticdem/geocells/n61w121.geojson   tile index (FeatureCollection)
//! <root>/arcticdem/strips/<id>_dem.tif        value raster (Zarr directory)
//! <root>/arcticdem/strips/<id>_bitmask.tif    flags raster (Zarr directory)
//! ```

use std::path::{Path, PathBuf};

use raster_common::BoundingBox;
use raster_io::{RasterInfo, ZarrRasterWriter};
use serde_json::{json, Value};

/// Bounding boxes used across the catalog tests.
pub mod bbox {
    use raster_common::BoundingBox;

    /// Geocell n61w121.
    pub const N61W121: BoundingBox = BoundingBox {
        min_x: -121.0,
        min_y: 61.0,
        max_x: -120.0,
        max_y: 62.0,
    };

    /// Geocell n61w120.
    pub const N61W120: BoundingBox = BoundingBox {
        min_x: -120.0,
        min_y: 61.0,
        max_x: -119.0,
        max_y: 62.0,
    };

    /// Straddles the n61w121/n61w120 boundary.
    pub const STRADDLING: BoundingBox = BoundingBox {
        min_x: -120.5,
        min_y: 61.2,
        max_x: -119.5,
        max_y: 61.8,
    };
}

/// One strip entry in a tile index.
#[derive(Debug, Clone)]
pub struct StripFixture {
    pub id: String,
    pub footprint: BoundingBox,
    /// Value of the reference field, usually a remote URL containing the marker.
    pub reference: String,
    pub start: String,
    pub end: String,
}

impl StripFixture {
    /// Strip whose reference points at `https://data.example.org/<marker>/strips/<id>_dem.tif`.
    pub fn new(id: &str, marker: &str, footprint: BoundingBox) -> Self {
        Self {
            id: id.to_string(),
            footprint,
            reference: format!("https://data.example.org/{}/strips/{}_dem.tif", marker, id),
            start: "2020-06-01T00:00:00Z".to_string(),
            end: "2020-06-03T00:00:00Z".to_string(),
        }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = reference.to_string();
        self
    }

    pub fn with_times(mut self, start: &str, end: &str) -> Self {
        self.start = start.to_string();
        self.end = end.to_string();
        self
    }

    /// GeoJSON feature with the `Dem`, `start_datetime` and `end_datetime` properties.
    pub fn to_feature(&self) -> Value {
        rect_feature(
            Some(&self.id),
            &self.footprint,
            json!({
                "Dem": self.reference,
                "start_datetime": self.start,
                "end_datetime": self.end,
            }),
        )
    }
}

/// Closed rectangular polygon ring, counter-clockwise.
pub fn rect_ring(b: &BoundingBox) -> Value {
    json!([[
        [b.min_x, b.min_y],
        [b.max_x, b.min_y],
        [b.max_x, b.max_y],
        [b.min_x, b.max_y],
        [b.min_x, b.min_y]
    ]])
}

/// GeoJSON Feature with a rectangular footprint.
pub fn rect_feature(id: Option<&str>, footprint: &BoundingBox, properties: Value) -> Value {
    let mut feature = json!({
        "type": "Feature",
        "geometry": { "type": "Polygon", "coordinates": rect_ring(footprint) },
        "properties": properties,
    });
    if let Some(id) = id {
        feature["id"] = json!(id);
    }
    feature
}

/// Wraps features into a FeatureCollection.
pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

/// Writes a geocell index file `<dir>/<tile_name>.geojson`.
pub fn write_tile_index(dir: &Path, tile_name: &str, strips: &[StripFixture]) -> PathBuf {
    let features = strips.iter().map(StripFixture::to_feature).collect();
    write_geojson(&dir.join(format!("{}.geojson", tile_name)), &feature_collection(features))
}

/// Writes any GeoJSON value to `path`, creating parent directories.
pub fn write_geojson(path: &Path, value: &Value) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    let text = serde_json::to_string_pretty(value).expect("Failed to serialize GeoJSON fixture");
    std::fs::write(path, text).expect("Failed to write GeoJSON fixture");
    path.to_path_buf()
}

/// Writes a Zarr raster with default writer settings.
pub fn write_raster(path: &Path, info: &RasterInfo, data: &[f32]) -> PathBuf {
    ZarrRasterWriter::default()
        .write(path, data, info)
        .expect("Failed to write raster fixture");
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_feature_shape() {
        let strip = StripFixture::new("s1", "arcticdem", bbox::N61W121);
        let feature = strip.to_feature();
        assert_eq!(feature["id"], "s1");
        assert_eq!(
            feature["properties"]["Dem"],
            "https://data.example.org/arcticdem/strips/s1_dem.tif"
        );
        assert_eq!(feature["geometry"]["coordinates"][0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_write_tile_index() {
        let dir = crate::temp_test_dir();
        let strips = vec![
            StripFixture::new("a", "arcticdem", bbox::N61W121),
            StripFixture::new("b", "arcticdem", bbox::N61W121),
        ];
        let path = write_tile_index(&dir.path().join("geocells"), "n61w121", &strips);

        let text = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_write_raster() {
        let dir = crate::temp_test_dir();
        let info = RasterInfo::north_up(-121.0, 62.0, 0.25, 4, 4);
        let path = write_raster(
            &dir.path().join("r_dem.tif"),
            &info,
            &crate::create_test_grid(4, 4),
        );
        assert!(path.exists());
    }
}
