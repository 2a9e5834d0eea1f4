//! GeoJSON vector layers.
//!
//! Index tiles and boundary documents are GeoJSON `FeatureCollection`s.
//! Only the geometry kinds footprints actually use are understood:
//! `Point`, `Polygon` and `MultiPolygon`. Features with any other (or no)
//! geometry are dropped with a debug log.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use geo::{BoundingRect, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

use raster_common::BoundingBox;

use crate::error::{IoError, Result};

/// One feature of a vector layer.
#[derive(Debug, Clone)]
pub struct VectorFeature {
    /// Feature `id`, if present (numbers are rendered as strings).
    pub id: Option<String>,
    pub geometry: Geometry<f64>,
    pub properties: Map<String, Value>,
}

impl VectorFeature {
    /// Envelope of the feature geometry.
    pub fn envelope(&self) -> Option<BoundingBox> {
        self.geometry
            .bounding_rect()
            .map(|r| BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
    }
}

/// A parsed vector layer.
#[derive(Debug, Clone, Default)]
pub struct VectorLayer {
    pub features: Vec<VectorFeature>,
}

impl VectorLayer {
    /// Union of all feature envelopes.
    pub fn extent(&self) -> Option<BoundingBox> {
        self.features
            .iter()
            .filter_map(VectorFeature::envelope)
            .reduce(|a, b| {
                BoundingBox::new(
                    a.min_x.min(b.min_x),
                    a.min_y.min(b.min_y),
                    a.max_x.max(b.max_x),
                    a.max_y.max(b.max_y),
                )
            })
    }

    pub fn geometries(&self) -> Vec<Geometry<f64>> {
        self.features.iter().map(|f| f.geometry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Reads vector layers.
pub trait VectorIo: Send + Sync {
    /// Read the layer at `path`; `Ok(None)` when it does not exist.
    fn read_layer(&self, path: &Path) -> Result<Option<VectorLayer>>;
}

/// [`VectorIo`] for GeoJSON files.
#[derive(Debug, Default)]
pub struct GeoJsonVectorIo {
    reads: AtomicU64,
}

impl GeoJsonVectorIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers read from disk.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl VectorIo for GeoJsonVectorIo {
    fn read_layer(&self, path: &Path) -> Result<Option<VectorLayer>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IoError::read_failed(path.display().to_string(), e.to_string()));
            }
        };
        self.reads.fetch_add(1, Ordering::Relaxed);

        let layer = parse_geojson(&text)?;
        tracing::debug!(
            path = %path.display(),
            features = layer.len(),
            "Read vector layer"
        );
        Ok(Some(layer))
    }
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

/// Parse a GeoJSON document: a `FeatureCollection`, a single `Feature`,
/// or a bare geometry.
pub fn parse_geojson(text: &str) -> Result<VectorLayer> {
    let doc: Value = serde_json::from_str(text)?;
    let kind = doc
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| IoError::Parse("GeoJSON object has no type".to_string()))?
        .to_string();

    let raw_features: Vec<RawFeature> = match kind.as_str() {
        "FeatureCollection" => match doc.get("features") {
            Some(features) => serde_json::from_value(features.clone())?,
            None => Vec::new(),
        },
        "Feature" => vec![serde_json::from_value(doc)?],
        _ => vec![RawFeature {
            id: None,
            geometry: Some(doc),
            properties: None,
        }],
    };

    let mut features = Vec::with_capacity(raw_features.len());
    for (i, raw) in raw_features.into_iter().enumerate() {
        let Some(geometry) = raw.geometry.as_ref().and_then(parse_geometry) else {
            tracing::debug!(feature = i, "Skipping feature without usable geometry");
            continue;
        };
        let id = raw.id.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        });
        features.push(VectorFeature {
            id,
            geometry,
            properties: raw.properties.unwrap_or_default(),
        });
    }

    Ok(VectorLayer { features })
}

fn parse_geometry(value: &Value) -> Option<Geometry<f64>> {
    let coords = value.get("coordinates")?;
    match value.get("type")?.as_str()? {
        "Point" => parse_coord(coords).map(|c| Geometry::Point(Point::from(c))),
        "Polygon" => parse_polygon(coords).map(Geometry::Polygon),
        "MultiPolygon" => coords
            .as_array()?
            .iter()
            .map(parse_polygon)
            .collect::<Option<Vec<_>>>()
            .map(|polys| Geometry::MultiPolygon(MultiPolygon::new(polys))),
        _ => None,
    }
}

fn parse_coord(value: &Value) -> Option<Coord<f64>> {
    let arr = value.as_array()?;
    Some(Coord {
        x: arr.first()?.as_f64()?,
        y: arr.get(1)?.as_f64()?,
    })
}

fn parse_ring(value: &Value) -> Option<LineString<f64>> {
    value
        .as_array()?
        .iter()
        .map(parse_coord)
        .collect::<Option<Vec<_>>>()
        .map(LineString::from)
}

fn parse_polygon(value: &Value) -> Option<Polygon<f64>> {
    let mut rings = value
        .as_array()?
        .iter()
        .map(parse_ring)
        .collect::<Option<Vec<_>>>()?
        .into_iter();
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}
