//! End-to-end tests over an on-disk geocell catalog.

use std::path::Path;
use std::sync::Arc;

use geo_index::{
    GeoIndexStore, IndexError, LayerRole, MaskRasterBuilder, Provider, ProviderConfig,
    ResolveOptions, SingleBoundaryProvider,
};
use raster_common::{BoundingBox, GeocellKey, QueryGeometry};
use raster_io::GeoJsonVectorIo;
use test_utils::{
    assert_approx_eq, bbox, geocell_dir, init_test_logging, write_tile_index, StripFixture,
};

fn provider(root: &Path) -> Provider {
    let config = ProviderConfig::arcticdem_strips(&root.to_string_lossy());
    Provider::from_config(config, Arc::new(GeoJsonVectorIo::new())).unwrap()
}

fn geocells(root: &Path) -> std::path::PathBuf {
    geocell_dir(root, "arcticdem")
}

fn with_flags() -> ResolveOptions {
    ResolveOptions {
        wants_flags: true,
        bands: vec![],
    }
}

// ============================================================================
// Missing tiles
// ============================================================================

#[test]
fn test_point_over_missing_tile_is_unavailable() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    write_tile_index(
        &geocells(dir.path()),
        "n61w120",
        &[StripFixture::new("s1", "arcticdem", bbox::N61W120)],
    );

    let provider = provider(dir.path());
    let err = provider
        .load_index(&QueryGeometry::point(-120.3, 61.4))
        .unwrap_err();
    match err {
        IndexError::IndexUnavailable { tiles } => assert_eq!(tiles, 1),
        other => panic!("expected IndexUnavailable, got {:?}", other),
    }
}

#[test]
fn test_polygon_over_partial_catalog_uses_present_tile() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    write_tile_index(
        &geocells(dir.path()),
        "n61w120",
        &[StripFixture::new("s1", "arcticdem", bbox::N61W120)],
    );

    let provider = provider(dir.path());
    let query = QueryGeometry::rectangle(&bbox::STRADDLING).unwrap();
    let snapshot = provider.load_index(&query).unwrap();
    assert_eq!(snapshot.feature_count(), 1);
    assert_eq!(snapshot.missing_tiles().len(), 1);

    let groups = provider
        .resolve_groups(&snapshot, &query, &with_flags())
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, "s1");

    let root = dir.path().to_string_lossy().trim_end_matches('/').to_string();
    let value = groups[0].value_layers().next().unwrap();
    assert_eq!(value.path, format!("{}/arcticdem/strips/s1_dem.tif", root));
    assert!(value.is_elevation);
    let flags = groups[0].flags_layer().unwrap();
    assert_eq!(flags.role, LayerRole::Flags);
    assert_eq!(flags.path, format!("{}/arcticdem/strips/s1_bitmask.tif", root));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_reference_without_marker_is_skipped() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let strips = vec![
        StripFixture::new("a", "arcticdem", bbox::N61W121),
        StripFixture::new("b", "arcticdem", bbox::N61W121)
            .with_reference("https://elsewhere.example.org/strips/b_dem.tif"),
        StripFixture::new("c", "arcticdem", bbox::N61W121),
    ];
    write_tile_index(&geocells(dir.path()), "n61w121", &strips);

    let provider = provider(dir.path());
    let query = QueryGeometry::point(-120.3, 61.4);
    let snapshot = provider.load_index(&query).unwrap();
    assert_eq!(snapshot.feature_count(), 3);

    let groups = provider
        .resolve_groups(&snapshot, &query, &ResolveOptions::default())
        .unwrap();
    let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[test]
fn test_resolution_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let strips = vec![
        StripFixture::new("a", "arcticdem", bbox::N61W121)
            .with_times("2019-01-01T00:00:00Z", "2019-01-01T12:00:00Z"),
        StripFixture::new("b", "arcticdem", bbox::N61W121),
    ];
    write_tile_index(&geocells(dir.path()), "n61w121", &strips);

    let provider = provider(dir.path());
    let query = QueryGeometry::point(-120.3, 61.4);
    let snapshot = provider.load_index(&query).unwrap();

    let first = provider
        .resolve_groups(&snapshot, &query, &with_flags())
        .unwrap();
    let second = provider
        .resolve_groups(&snapshot, &query, &with_flags())
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first[0].time.to_rfc3339(),
        "2019-01-01T06:00:00+00:00"
    );
}

#[test]
fn test_query_outside_every_footprint_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let footprint = BoundingBox::new(-120.9, 61.8, -120.8, 61.9);
    write_tile_index(
        &geocells(dir.path()),
        "n61w121",
        &[StripFixture::new("a", "arcticdem", footprint)],
    );

    let provider = provider(dir.path());
    let query = QueryGeometry::point(-120.3, 61.4);
    let snapshot = provider.load_index(&query).unwrap();
    let err = provider
        .resolve_groups(&snapshot, &query, &ResolveOptions::default())
        .unwrap_err();
    assert!(err.is_empty_result());
}

#[test]
fn test_covering_keys_contain_every_vertex_cell() {
    let query = QueryGeometry::polygon(vec![
        (-122.4, 60.2),
        (-119.1, 60.9),
        (-120.0, 63.7),
    ])
    .unwrap();
    let keys = GeoIndexStore::covering_keys(&query);

    for &(lon, lat) in &[(-122.4, 60.2), (-119.1, 60.9), (-120.0, 63.7)] {
        assert!(
            keys.contains(&GeocellKey::from_coords(lon, lat)),
            "missing cell for ({}, {})",
            lon,
            lat
        );
    }
    // lon -123..-119, lat 60..63
    assert_eq!(keys.len(), 4 * 4);
}

// ============================================================================
// Mask rasters
// ============================================================================

const TRIANGLE: &str = r#"{"type": "Feature", "properties": {},
    "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [4, 0], [0, 4], [0, 0]]]}}"#;

#[test]
fn test_mask_rejects_bad_cell_sizes() {
    for cell in [0.0, -5.0, f64::NAN] {
        let err = MaskRasterBuilder::build_from_geojson("mask://t", TRIANGLE, cell).unwrap_err();
        assert!(matches!(err, IndexError::InvalidCellSize(_)), "cell {}", cell);
    }
}

#[test]
fn test_mask_grid_covers_boundary_extent() {
    let mask = MaskRasterBuilder::build_from_geojson("mask://t", TRIANGLE, 0.01).unwrap();
    let covered = (mask.rows() * mask.cols()) as f64 * mask.cell_size() * mask.cell_size();
    assert_approx_eq!(covered, 16.0, 0.16);

    // Roughly half of the grid lies inside the triangle
    let ratio = mask.on_count() as f64 / (mask.rows() * mask.cols()) as f64;
    assert_approx_eq!(ratio, 0.5, 0.02);
}

#[test]
fn test_mask_includes_from_many_threads() {
    let provider = SingleBoundaryProvider::new("aoi", TRIANGLE, 0.05).unwrap();
    let cases: Vec<(f64, f64, bool)> = vec![
        (0.5, 0.5, true),
        (1.0, 2.0, true),
        (3.5, 3.5, false),
        (-0.5, 1.0, false),
        (2.0, 0.2, true),
        (5.0, 5.0, false),
    ];

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..100 {
                    for &(lon, lat, expected) in &cases {
                        assert_eq!(provider.includes(lon, lat, 0.0), expected);
                    }
                }
            });
        }
    });
}
