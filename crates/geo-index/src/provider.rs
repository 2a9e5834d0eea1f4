//! Raster providers.
//!
//! Every provider answers the same two questions: which index features
//! cover a query, and which raster groups those features resolve to.
//! Tile catalogs read sparse per-geocell index files; single-boundary
//! providers serve one rasterized vector boundary as a mask.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::{BoundingRect, Geometry};

use raster_common::QueryGeometry;
use raster_io::{RasterDataset, VectorIo};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{IndexError, Result};
use crate::feature::IndexFeature;
use crate::group::{LayerDescriptor, LayerRole, RasterGroup};
use crate::mask::{MaskRaster, MaskRasterBuilder};
use crate::resolver::{RasterGroupResolver, ResolveOptions};
use crate::store::{GeoIndexStore, IndexSnapshot};

/// Provider backed by a geocell tile catalog.
pub struct TileCatalogProvider {
    config: ProviderConfig,
    store: GeoIndexStore,
    resolver: RasterGroupResolver,
}

impl TileCatalogProvider {
    pub fn new(config: ProviderConfig, vector_io: Arc<dyn VectorIo>) -> Result<Self> {
        config
            .validate()
            .map_err(|msg| IndexError::config(format!("{}: {}", config.id, msg)))?;

        let capacity = NonZeroUsize::new(config.tile_cache_capacity)
            .ok_or_else(|| IndexError::config("tile_cache_capacity must be > 0"))?;
        let store = GeoIndexStore::new(
            vector_io,
            &config.geocell_dir,
            &config.index_extension,
            capacity,
        );
        let resolver = RasterGroupResolver::new(&config);

        Ok(Self {
            config,
            store,
            resolver,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &GeoIndexStore {
        &self.store
    }

    pub fn load_index(&self, geometry: &QueryGeometry) -> Result<IndexSnapshot> {
        self.store.load_index(geometry)
    }

    pub fn resolve_groups(
        &self,
        snapshot: &IndexSnapshot,
        geometry: &QueryGeometry,
        options: &ResolveOptions,
    ) -> Result<Vec<RasterGroup>> {
        self.resolver.resolve(snapshot, geometry, options)
    }
}

/// Provider whose whole catalog is one vector boundary.
pub struct SingleBoundaryProvider {
    id: String,
    band_catalog: String,
    boundary: Vec<Geometry<f64>>,
    mask: Arc<MaskRaster>,
    group: RasterGroup,
}

impl SingleBoundaryProvider {
    /// Build the mask eagerly from a GeoJSON boundary document.
    pub fn new(id: &str, boundary_geojson: &str, cell_size: f64) -> Result<Self> {
        let path = format!("mask://{}", id);
        let layer = raster_io::parse_geojson(boundary_geojson)
            .map_err(|e| IndexError::invalid_boundary(e.to_string()))?;
        let boundary = layer.geometries();
        let mask = MaskRasterBuilder::build(&path, &boundary, cell_size)?;

        let group = RasterGroup {
            id: id.to_string(),
            // Boundaries carry no acquisition time
            time: DateTime::<Utc>::default(),
            layers: vec![LayerDescriptor {
                role: LayerRole::Value,
                band: "mask".to_string(),
                path,
                is_elevation: false,
            }],
        };

        Ok(Self {
            id: id.to_string(),
            band_catalog: "mask".to_string(),
            boundary,
            mask: Arc::new(mask),
            group,
        })
    }

    /// Build from a configuration naming a boundary file.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|msg| IndexError::config(format!("{}: {}", config.id, msg)))?;
        let (Some(path), Some(cell_size)) = (&config.boundary_path, config.mask_cell_size) else {
            return Err(IndexError::config("boundary_path and mask_cell_size are required"));
        };

        let geojson = std::fs::read_to_string(path)
            .map_err(|e| IndexError::invalid_boundary(format!("{}: {}", path, e)))?;
        let mut provider = Self::new(&config.id, &geojson, cell_size)?;
        provider.band_catalog = config.band_catalog.clone();
        Ok(provider)
    }

    pub fn mask(&self) -> &Arc<MaskRaster> {
        &self.mask
    }

    pub fn includes(&self, lon: f64, lat: f64, height: f64) -> bool {
        self.mask.includes(lon, lat, height)
    }

    /// The boundary as index features.
    pub fn load_index(&self, _geometry: &QueryGeometry) -> Result<IndexSnapshot> {
        let features = self
            .boundary
            .iter()
            .map(|geometry| IndexFeature {
                id: Some(self.id.clone()),
                geometry: geometry.clone(),
                properties: Default::default(),
                source: PathBuf::from(self.mask.path()),
            })
            .collect();
        Ok(IndexSnapshot::from_features(self.mask.path(), features))
    }

    /// The mask group, when the query touches the mask extent.
    pub fn resolve_groups(
        &self,
        _snapshot: &IndexSnapshot,
        geometry: &QueryGeometry,
        _options: &ResolveOptions,
    ) -> Result<Vec<RasterGroup>> {
        let extent = self.mask.bbox();
        let touches = match geometry.to_geo().bounding_rect() {
            Some(r) => {
                r.min().x <= extent.max_x
                    && r.max().x >= extent.min_x
                    && r.min().y <= extent.max_y
                    && r.max().y >= extent.min_y
            }
            None => false,
        };
        if !touches {
            return Err(IndexError::GroupResolutionEmpty);
        }
        Ok(vec![self.group.clone()])
    }
}

/// A configured raster provider.
pub enum Provider {
    TileCatalog(TileCatalogProvider),
    SingleBoundary(SingleBoundaryProvider),
}

impl Provider {
    /// Construct the provider variant named by `config.kind`.
    pub fn from_config(config: ProviderConfig, vector_io: Arc<dyn VectorIo>) -> Result<Self> {
        let provider = match config.kind {
            ProviderKind::TileCatalog => Self::TileCatalog(TileCatalogProvider::new(config, vector_io)?),
            ProviderKind::SingleBoundary => {
                Self::SingleBoundary(SingleBoundaryProvider::from_config(&config)?)
            }
        };
        tracing::debug!(provider = %provider.id(), "Constructed provider");
        Ok(provider)
    }

    pub fn id(&self) -> &str {
        match self {
            Self::TileCatalog(p) => &p.config.id,
            Self::SingleBoundary(p) => &p.id,
        }
    }

    /// Band catalog used for request validation.
    pub fn band_catalog(&self) -> &str {
        match self {
            Self::TileCatalog(p) => &p.config.band_catalog,
            Self::SingleBoundary(p) => &p.band_catalog,
        }
    }

    /// Name of the band that carries flags for this provider, if any.
    pub fn flags_band(&self) -> Option<&str> {
        match self {
            Self::TileCatalog(p) => Some(&p.config.flags_band),
            Self::SingleBoundary(_) => None,
        }
    }

    pub fn load_index(&self, geometry: &QueryGeometry) -> Result<IndexSnapshot> {
        match self {
            Self::TileCatalog(p) => p.load_index(geometry),
            Self::SingleBoundary(p) => p.load_index(geometry),
        }
    }

    pub fn resolve_groups(
        &self,
        snapshot: &IndexSnapshot,
        geometry: &QueryGeometry,
        options: &ResolveOptions,
    ) -> Result<Vec<RasterGroup>> {
        match self {
            Self::TileCatalog(p) => p.resolve_groups(snapshot, geometry, options),
            Self::SingleBoundary(p) => p.resolve_groups(snapshot, geometry, options),
        }
    }

    /// Datasets that exist only in memory and must be served without opening.
    pub fn preopened_datasets(&self) -> Vec<(String, Arc<dyn RasterDataset>)> {
        match self {
            Self::TileCatalog(_) => Vec::new(),
            Self::SingleBoundary(p) => {
                let mask: Arc<dyn RasterDataset> = p.mask.clone();
                vec![(p.mask.path().to_string(), mask)]
            }
        }
    }
}
