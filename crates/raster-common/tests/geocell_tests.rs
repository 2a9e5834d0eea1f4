//! Tests for geocell enumeration over query envelopes.

use std::collections::HashSet;

use raster_common::{BoundingBox, GeocellKey, QueryGeometry};

fn keys_for(ring: Vec<(f64, f64)>) -> Vec<GeocellKey> {
    let geometry = QueryGeometry::polygon(ring).unwrap();
    GeocellKey::covering(&geometry.envelope())
}

// ============================================================================
// Enumeration bounds
// ============================================================================

#[test]
fn test_covering_matches_floor_ceil_ranges() {
    let cases = [
        BoundingBox::new(-120.7, 61.2, -118.1, 62.5),
        BoundingBox::new(-0.5, -0.5, 0.5, 0.5),
        BoundingBox::new(179.2, -89.9, 179.9, -88.1),
        BoundingBox::new(10.0, 20.0, 10.25, 20.75),
    ];

    for env in cases {
        let keys: HashSet<GeocellKey> = GeocellKey::covering(&env).into_iter().collect();
        let mut expected = HashSet::new();
        for lon in (env.min_x.floor() as i32)..(env.max_x.ceil() as i32) {
            for lat in (env.min_y.floor() as i32)..(env.max_y.ceil() as i32) {
                expected.insert(GeocellKey::new(lon, lat));
            }
        }
        assert_eq!(keys, expected, "envelope {:?}", env);
    }
}

#[test]
fn test_covering_has_no_duplicates() {
    let keys = keys_for(vec![(-3.5, -2.5), (2.5, -2.5), (2.5, 1.5), (-3.5, 1.5)]);
    let unique: HashSet<_> = keys.iter().copied().collect();
    assert_eq!(unique.len(), keys.len());
    // lon -4..=2, lat -3..=1
    assert_eq!(keys.len(), 7 * 5);
}

#[test]
fn test_every_tile_touches_envelope() {
    let env = BoundingBox::new(-50.8, 60.3, -48.2, 61.9);
    for key in GeocellKey::covering(&env) {
        let tile = key.bbox();
        assert!(tile.intersects(&env), "{} does not touch {:?}", key, env);
    }
}

// ============================================================================
// Tile names across hemispheres
// ============================================================================

#[test]
fn test_tile_names_around_the_origin() {
    let names: Vec<String> = keys_for(vec![(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)])
        .iter()
        .map(GeocellKey::tile_name)
        .collect();
    assert_eq!(names, vec!["s01w001", "n00w001", "s01e000", "n00e000"]);
}

#[test]
fn test_tile_name_padding() {
    assert_eq!(GeocellKey::new(-5, 61).tile_name(), "n61w005");
    assert_eq!(GeocellKey::new(5, 1).tile_name(), "n01e005");
    assert_eq!(GeocellKey::new(-180, -90).tile_name(), "s90w180");
    assert_eq!(GeocellKey::new(-51, 61).to_string(), "n61w051");
}

// ============================================================================
// Envelope helpers
// ============================================================================

#[test]
fn test_point_envelope_covers_one_cell() {
    let point = QueryGeometry::point_with_height(-120.3, 61.4, 1500.0);
    let env = point.envelope();
    assert_eq!(env.area(), 0.0);
    assert_eq!(GeocellKey::from_coords(env.min_x, env.min_y).tile_name(), "n61w121");
}

#[test]
fn test_bbox_parse_and_expand() {
    let bbox: BoundingBox = "-121,61,-120,62".parse().unwrap();
    assert_eq!(bbox, BoundingBox::new(-121.0, 61.0, -120.0, 62.0));
    assert_eq!(bbox.center(), (-120.5, 61.5));

    let grown = bbox.expand(0.5);
    assert_eq!(grown, BoundingBox::new(-121.5, 60.5, -119.5, 62.5));
    assert_eq!(GeocellKey::covering(&grown).len(), 3 * 3);

    assert!("1,2,3".parse::<BoundingBox>().is_err());
    assert!("a,2,3,4".parse::<BoundingBox>().is_err());
}
