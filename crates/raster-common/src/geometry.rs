//! Query geometries (point or polygon) in lon/lat.

use geo::{Coord, Geometry, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::GeometryError;

/// The area of interest of a query session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryGeometry {
    /// A single location. Height is carried for interface uniformity only.
    Point { lon: f64, lat: f64, height: f64 },
    /// A closed ring of lon/lat vertices.
    Polygon { ring: Vec<(f64, f64)> },
}

impl QueryGeometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        Self::Point {
            lon,
            lat,
            height: 0.0,
        }
    }

    pub fn point_with_height(lon: f64, lat: f64, height: f64) -> Self {
        Self::Point { lon, lat, height }
    }

    /// Build a polygon from an ordered ring. The ring is closed if needed.
    pub fn polygon(vertices: Vec<(f64, f64)>) -> Result<Self, GeometryError> {
        if let Some(&(x, y)) = vertices.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(GeometryError::NonFinite { x, y });
        }

        let mut ring = vertices;
        ring.dedup();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(GeometryError::TooFewVertices(ring.len()));
        }

        let first = ring[0];
        ring.push(first);
        Ok(Self::Polygon { ring })
    }

    /// Axis-aligned rectangle as a polygon.
    pub fn rectangle(bbox: &BoundingBox) -> Result<Self, GeometryError> {
        Self::polygon(vec![
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
        ])
    }

    /// Reject non-finite coordinates.
    ///
    /// Points built with [`QueryGeometry::point`] or deserialized from a
    /// request are not checked on construction.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let bad = match self {
            Self::Point { lon, lat, .. } => {
                Some((*lon, *lat)).filter(|(x, y)| !x.is_finite() || !y.is_finite())
            }
            Self::Polygon { ring } => ring
                .iter()
                .copied()
                .find(|(x, y)| !x.is_finite() || !y.is_finite()),
        };
        match bad {
            Some((x, y)) => Err(GeometryError::NonFinite { x, y }),
            None => Ok(()),
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point { .. })
    }

    /// Envelope of the geometry; a point yields a zero-area box.
    pub fn envelope(&self) -> BoundingBox {
        match self {
            Self::Point { lon, lat, .. } => BoundingBox::new(*lon, *lat, *lon, *lat),
            Self::Polygon { ring } => BoundingBox::from_points(ring)
                .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0)),
        }
    }

    pub fn to_geo(&self) -> Geometry<f64> {
        match self {
            Self::Point { lon, lat, .. } => Geometry::Point(Point::new(*lon, *lat)),
            Self::Polygon { ring } => {
                let exterior: LineString<f64> =
                    ring.iter().map(|&(x, y)| Coord { x, y }).collect();
                Geometry::Polygon(Polygon::new(exterior, vec![]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Intersects;

    #[test]
    fn test_polygon_is_closed() {
        let geom = QueryGeometry::polygon(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]).unwrap();
        match geom {
            QueryGeometry::Polygon { ring } => {
                assert_eq!(ring.len(), 4);
                assert_eq!(ring.first(), ring.last());
            }
            _ => panic!("expected polygon"),
        }
    }

    #[test]
    fn test_polygon_rejects_degenerate_ring() {
        let err = QueryGeometry::polygon(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]).unwrap_err();
        assert_eq!(err, GeometryError::TooFewVertices(2));
    }

    #[test]
    fn test_polygon_rejects_nan() {
        let err = QueryGeometry::polygon(vec![(0.0, 0.0), (f64::NAN, 1.0), (1.0, 0.0)]);
        assert!(matches!(err, Err(GeometryError::NonFinite { .. })));
    }

    #[test]
    fn test_validate_rejects_non_finite_points() {
        assert!(QueryGeometry::point(-120.3, 61.4).validate().is_ok());
        for (lon, lat) in [(f64::NAN, 61.4), (-120.3, f64::INFINITY), (f64::NEG_INFINITY, 0.0)] {
            assert!(matches!(
                QueryGeometry::point(lon, lat).validate(),
                Err(GeometryError::NonFinite { .. })
            ));
        }

        let ring = QueryGeometry::Polygon {
            ring: vec![(0.0, 0.0), (1.0, f64::NAN), (1.0, 1.0), (0.0, 0.0)],
        };
        assert!(ring.validate().is_err());
    }

    #[test]
    fn test_envelope() {
        let geom =
            QueryGeometry::polygon(vec![(-120.7, 61.2), (-118.1, 61.5), (-119.0, 62.5)]).unwrap();
        assert_eq!(geom.envelope(), BoundingBox::new(-120.7, 61.2, -118.1, 62.5));

        let point = QueryGeometry::point(-120.3, 61.4);
        assert_eq!(point.envelope(), BoundingBox::new(-120.3, 61.4, -120.3, 61.4));
    }

    #[test]
    fn test_to_geo_intersects() {
        let square = QueryGeometry::rectangle(&BoundingBox::new(0.0, 0.0, 2.0, 2.0)).unwrap();
        assert!(square.to_geo().intersects(&QueryGeometry::point(1.0, 1.0).to_geo()));
        assert!(!square.to_geo().intersects(&QueryGeometry::point(3.0, 1.0).to_geo()));
    }
}
