//! Provider configuration.
//!
//! A provider is described by a YAML document:
//!
//! ```yaml
//! id: arcticdem-strips
//! kind: tile_catalog
//! catalog_root: ${PGC_DATA}/pgc
//! geocell_dir: ${PGC_DATA}/pgc/arcticdem/geocells
//! marker: arcticdem
//! reference_field: Dem
//! value_suffix: _dem.tif
//! flags_suffix: _bitmask.tif
//! band_catalog: arcticdem
//! ```
//!
//! Path fields go through `${VAR}` / `~` expansion when loaded.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// How a provider locates its rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Sparse catalog of per-geocell index files.
    TileCatalog,
    /// One vector boundary, served as a mask raster.
    SingleBoundary,
}

/// Harmonized Landsat Sentinel-2 product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HlsSensor {
    /// HLS L30 (Landsat 8 OLI).
    Landsat8,
    /// HLS S30 (Sentinel-2 MSI).
    Sentinel2,
}

impl HlsSensor {
    pub fn band_catalog(&self) -> &'static str {
        match self {
            Self::Landsat8 => "hls-l30",
            Self::Sentinel2 => "hls-s30",
        }
    }

    /// Product name as it appears in granule file names.
    pub fn product(&self) -> &'static str {
        match self {
            Self::Landsat8 => "HLS.L30",
            Self::Sentinel2 => "HLS.S30",
        }
    }
}

fn default_index_extension() -> String {
    "geojson".to_string()
}

fn default_reference_field() -> String {
    "Dem".to_string()
}

fn default_time_fields() -> Vec<String> {
    vec!["start_datetime".to_string(), "end_datetime".to_string()]
}

fn default_value_band() -> String {
    "value".to_string()
}

fn default_flags_band() -> String {
    "flags".to_string()
}

fn default_tile_cache_capacity() -> usize {
    64
}

/// Configuration of one raster provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,

    /// Local root that file references are rebased under.
    #[serde(default)]
    pub catalog_root: String,

    /// Directory holding the geocell index files (tile catalogs).
    #[serde(default)]
    pub geocell_dir: String,

    #[serde(default = "default_index_extension")]
    pub index_extension: String,

    /// Token expected once in every file reference.
    #[serde(default)]
    pub marker: String,

    /// Index feature field holding the file reference.
    #[serde(default = "default_reference_field")]
    pub reference_field: String,

    /// Fields averaged into the representative time.
    #[serde(default = "default_time_fields")]
    pub time_fields: Vec<String>,

    /// Value-layer file suffix replaced to derive the flags layer.
    #[serde(default)]
    pub value_suffix: Option<String>,

    #[serde(default)]
    pub flags_suffix: Option<String>,

    #[serde(default = "default_value_band")]
    pub value_band: String,

    #[serde(default = "default_flags_band")]
    pub flags_band: String,

    /// Placeholder in file references substituted with band names.
    #[serde(default)]
    pub band_placeholder: Option<String>,

    /// Only file references containing this substring are served.
    #[serde(default)]
    pub url_substring: Option<String>,

    #[serde(default)]
    pub is_elevation: bool,

    /// Band catalog used for request validation.
    pub band_catalog: String,

    /// Drop groups whose flags layer cannot be derived.
    #[serde(default)]
    pub require_flags: bool,

    #[serde(default = "default_tile_cache_capacity")]
    pub tile_cache_capacity: usize,

    /// Boundary GeoJSON file (single-boundary providers).
    #[serde(default)]
    pub boundary_path: Option<String>,

    /// Mask cell size in boundary units (single-boundary providers).
    #[serde(default)]
    pub mask_cell_size: Option<f64>,
}

impl ProviderConfig {
    fn base(id: &str, kind: ProviderKind, band_catalog: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            catalog_root: String::new(),
            geocell_dir: String::new(),
            index_extension: default_index_extension(),
            marker: String::new(),
            reference_field: default_reference_field(),
            time_fields: default_time_fields(),
            value_suffix: None,
            flags_suffix: None,
            value_band: default_value_band(),
            flags_band: default_flags_band(),
            band_placeholder: None,
            url_substring: None,
            is_elevation: false,
            band_catalog: band_catalog.to_string(),
            require_flags: false,
            tile_cache_capacity: default_tile_cache_capacity(),
            boundary_path: None,
            mask_cell_size: None,
        }
    }

    fn pgc_strips(id: &str, dem: &str, root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            catalog_root: root.to_string(),
            geocell_dir: format!("{}/{}/geocells", root, dem),
            marker: dem.to_string(),
            value_suffix: Some("_dem.tif".to_string()),
            flags_suffix: Some("_bitmask.tif".to_string()),
            value_band: "dem".to_string(),
            flags_band: "bitmask".to_string(),
            is_elevation: true,
            ..Self::base(id, ProviderKind::TileCatalog, dem)
        }
    }

    /// ArcticDEM strips under `root`.
    pub fn arcticdem_strips(root: &str) -> Self {
        Self::pgc_strips("arcticdem-strips", "arcticdem", root)
    }

    /// REMA strips under `root`.
    pub fn rema_strips(root: &str) -> Self {
        Self::pgc_strips("rema-strips", "rema", root)
    }

    /// HLS granules under `root`, one file per band.
    pub fn landsat_hls(root: &str, sensor: HlsSensor) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            catalog_root: root.to_string(),
            geocell_dir: format!("{}/hls/geocells", root),
            marker: "hls".to_string(),
            reference_field: "url".to_string(),
            value_band: "B04".to_string(),
            flags_band: "Fmask".to_string(),
            band_placeholder: Some("{band}".to_string()),
            url_substring: Some(sensor.product().to_string()),
            ..Self::base("landsat-hls", ProviderKind::TileCatalog, sensor.band_catalog())
        }
    }

    /// A single boundary file served as a mask.
    pub fn single_boundary(id: &str, boundary_path: &str, cell_size: f64) -> Self {
        Self {
            boundary_path: Some(boundary_path.to_string()),
            mask_cell_size: Some(cell_size),
            value_band: "mask".to_string(),
            ..Self::base(id, ProviderKind::SingleBoundary, "mask")
        }
    }

    /// Parse a YAML document and expand path fields.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.expand_paths()?;
        config
            .validate()
            .map_err(|msg| IndexError::config(format!("{}: {}", config.id, msg)))?;
        Ok(config)
    }

    /// Load a YAML provider file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IndexError::config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_yaml_str(&contents)?;
        tracing::info!(
            provider = %config.id,
            path = %path.display(),
            "Loaded provider config"
        );
        Ok(config)
    }

    fn expand_paths(&mut self) -> Result<()> {
        self.catalog_root = expand(&self.catalog_root)?;
        self.geocell_dir = expand(&self.geocell_dir)?;
        if let Some(boundary) = &self.boundary_path {
            self.boundary_path = Some(expand(boundary)?);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.is_empty() {
            return Err("id must not be empty".to_string());
        }
        if self.band_catalog.is_empty() {
            return Err("band_catalog must not be empty".to_string());
        }

        match self.kind {
            ProviderKind::TileCatalog => {
                if self.geocell_dir.is_empty() {
                    return Err("geocell_dir is required for tile catalogs".to_string());
                }
                if self.marker.is_empty() {
                    return Err("marker is required for tile catalogs".to_string());
                }
                if self.time_fields.len() < 2 {
                    return Err("at least two time_fields are required".to_string());
                }
                if self.tile_cache_capacity == 0 {
                    return Err("tile_cache_capacity must be > 0".to_string());
                }
                if self.value_suffix.is_some() != self.flags_suffix.is_some() {
                    return Err("value_suffix and flags_suffix must be set together".to_string());
                }
                if self.require_flags
                    && self.value_suffix.is_none()
                    && self.band_placeholder.is_none()
                {
                    return Err("require_flags needs a suffix pair or a band placeholder".to_string());
                }
            }
            ProviderKind::SingleBoundary => {
                if self.boundary_path.is_none() {
                    return Err("boundary_path is required for single-boundary providers".to_string());
                }
                match self.mask_cell_size {
                    Some(cell) if cell.is_finite() && cell > 0.0 => {}
                    _ => return Err("mask_cell_size must be a positive number".to_string()),
                }
            }
        }

        Ok(())
    }
}

fn expand(path: &str) -> Result<String> {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .map_err(|e| IndexError::config(format!("cannot expand '{}': {}", path, e)))
}
