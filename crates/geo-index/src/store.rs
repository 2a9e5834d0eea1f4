//! Geocell tile index store.
//!
//! Tile index files are looked up by geocell key. The catalog is sparse:
//! geocells without acquisitions have no index file, and a missing file is
//! a debug-level event, not an error. Parsed tiles (and known-missing
//! tiles) are kept in an LRU cache so repeated queries over the same area
//! do not re-read the index.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;

use raster_common::{GeocellKey, QueryGeometry};
use raster_io::VectorIo;

use crate::error::{IndexError, Result};
use crate::feature::IndexFeature;

type TileFeatures = Arc<Vec<IndexFeature>>;

/// Features gathered for one query, frozen before resolution starts.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    tiles: Vec<(PathBuf, TileFeatures)>,
    missing: Vec<PathBuf>,
}

impl IndexSnapshot {
    /// Snapshot over features that did not come from tile files.
    pub fn from_features(source: impl Into<PathBuf>, features: Vec<IndexFeature>) -> Self {
        Self {
            tiles: vec![(source.into(), Arc::new(features))],
            missing: Vec::new(),
        }
    }

    /// All features in tile order. Features repeated across tiles appear once per tile.
    pub fn features(&self) -> impl Iterator<Item = &IndexFeature> {
        self.tiles.iter().flat_map(|(_, features)| features.iter())
    }

    pub fn feature_count(&self) -> usize {
        self.tiles.iter().map(|(_, features)| features.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_count() == 0
    }

    pub fn loaded_tiles(&self) -> impl Iterator<Item = &Path> {
        self.tiles.iter().map(|(path, _)| path.as_path())
    }

    /// Covering tiles that had no (usable) index file.
    pub fn missing_tiles(&self) -> &[PathBuf] {
        &self.missing
    }
}

/// Accumulates tiles for one query.
#[derive(Debug, Default)]
pub struct IndexSnapshotBuilder {
    snapshot: IndexSnapshot,
}

impl IndexSnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tile(&mut self, path: PathBuf, features: TileFeatures) {
        self.snapshot.tiles.push((path, features));
    }

    pub fn add_missing(&mut self, path: PathBuf) {
        self.snapshot.missing.push(path);
    }

    pub fn freeze(self) -> IndexSnapshot {
        self.snapshot
    }
}

/// Statistics for the tile cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Tile lookups that found no index file.
    pub absent: u64,
}

impl TileCacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct AtomicTileStats {
    hits: AtomicU64,
    misses: AtomicU64,
    absent: AtomicU64,
}

/// Loads and caches tile index files for a provider.
pub struct GeoIndexStore {
    vector_io: Arc<dyn VectorIo>,
    geocell_dir: PathBuf,
    extension: String,
    /// `None` marks a tile known to be absent. Read errors are not cached.
    tiles: Mutex<LruCache<PathBuf, Option<TileFeatures>>>,
    stats: AtomicTileStats,
}

impl GeoIndexStore {
    pub fn new(
        vector_io: Arc<dyn VectorIo>,
        geocell_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        capacity: NonZeroUsize,
    ) -> Self {
        Self {
            vector_io,
            geocell_dir: geocell_dir.into(),
            extension: extension.into(),
            tiles: Mutex::new(LruCache::new(capacity)),
            stats: AtomicTileStats::default(),
        }
    }

    /// Geocell keys covering a query geometry.
    ///
    /// A point maps to exactly one geocell; a polygon to every geocell whose
    /// unit tile intersects its envelope.
    pub fn covering_keys(geometry: &QueryGeometry) -> Vec<GeocellKey> {
        match geometry {
            QueryGeometry::Point { lon, lat, .. } => vec![GeocellKey::from_coords(*lon, *lat)],
            QueryGeometry::Polygon { .. } => GeocellKey::covering(&geometry.envelope()),
        }
    }

    pub fn tile_path(&self, key: GeocellKey) -> PathBuf {
        key.tile_path(&self.geocell_dir, &self.extension)
    }

    /// Load every covering tile's features.
    ///
    /// Fails with [`IndexError::IndexUnavailable`] only if no covering tile
    /// yields any feature, and with [`IndexError::InvalidGeometry`] before
    /// any read if a coordinate is not finite.
    pub fn load_index(&self, geometry: &QueryGeometry) -> Result<IndexSnapshot> {
        geometry.validate()?;
        let keys = Self::covering_keys(geometry);
        let mut builder = IndexSnapshotBuilder::new();

        for key in &keys {
            let path = self.tile_path(*key);
            match self.load_tile(&path) {
                Some(features) => builder.add_tile(path, features),
                None => builder.add_missing(path),
            }
        }

        let snapshot = builder.freeze();
        tracing::debug!(
            tiles = keys.len(),
            missing = snapshot.missing_tiles().len(),
            features = snapshot.feature_count(),
            "Loaded geocell index"
        );

        if snapshot.is_empty() {
            return Err(IndexError::IndexUnavailable { tiles: keys.len() });
        }
        Ok(snapshot)
    }

    /// Features of one tile, from cache or disk.
    fn load_tile(&self, path: &Path) -> Option<TileFeatures> {
        {
            let mut cache = self.tiles.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cache.get(path) {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                if entry.is_none() {
                    self.stats.absent.fetch_add(1, Ordering::Relaxed);
                }
                return entry.clone();
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let entry = match self.vector_io.read_layer(path) {
            Ok(Some(layer)) => {
                let features: Vec<IndexFeature> = layer
                    .features
                    .into_iter()
                    .map(|f| IndexFeature::from_vector(f, path))
                    .collect();
                tracing::debug!(
                    path = %path.display(),
                    features = features.len(),
                    "Loaded index tile"
                );
                Some(Arc::new(features))
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No index file for geocell");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable index file");
                return None;
            }
        };
        if entry.is_none() {
            self.stats.absent.fetch_add(1, Ordering::Relaxed);
        }

        self.tiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(path.to_path_buf(), entry.clone());
        entry
    }

    pub fn stats(&self) -> TileCacheStats {
        TileCacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            absent: self.stats.absent.load(Ordering::Relaxed),
        }
    }

    /// Drop all cached tiles.
    pub fn clear(&self) {
        self.tiles.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
