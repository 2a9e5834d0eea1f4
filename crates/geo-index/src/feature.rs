//! Owned index features.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use geo::{Geometry, Intersects};
use serde_json::{Map, Value};

use raster_common::{parse_timestamp, TimeParseError};
use raster_io::VectorFeature;

/// One entry of a tile index: a raster footprint plus its metadata fields.
#[derive(Debug, Clone)]
pub struct IndexFeature {
    pub id: Option<String>,
    pub geometry: Geometry<f64>,
    pub properties: Map<String, Value>,
    /// Tile index file the feature was read from.
    pub source: PathBuf,
}

impl IndexFeature {
    pub fn from_vector(feature: VectorFeature, source: &Path) -> Self {
        Self {
            id: feature.id,
            geometry: feature.geometry,
            properties: feature.properties,
            source: source.to_path_buf(),
        }
    }

    /// String field, or `None` when absent or not a string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// Timestamp field parsed as UTC.
    pub fn field_datetime(&self, name: &str) -> Option<Result<DateTime<Utc>, TimeParseError>> {
        self.field_str(name).map(parse_timestamp)
    }

    pub fn intersects(&self, geometry: &Geometry<f64>) -> bool {
        self.geometry.intersects(geometry)
    }

    /// Name used in logs: the id if present, else the source tile.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self.source.display().to_string(),
        }
    }
}
