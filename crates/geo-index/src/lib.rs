//! Geocell index loading and raster group resolution.
//!
//! A query flows through this crate in three steps:
//!
//! 1. [`GeoIndexStore::load_index`] reads the tile index files covering the
//!    query geometry into a frozen [`IndexSnapshot`]
//! 2. [`RasterGroupResolver::resolve`] turns intersecting features into
//!    [`RasterGroup`]s with rebased VALUE/FLAGS layer paths
//! 3. [`GroupFilter`] narrows the groups by URL, time window or closest time
//!
//! Providers whose catalog is a single boundary skip the tile index and
//! serve a [`MaskRaster`] instead.

pub mod config;
pub mod error;
pub mod feature;
pub mod filter;
pub mod group;
pub mod mask;
pub mod provider;
pub mod resolver;
pub mod store;

pub use config::{HlsSensor, ProviderConfig, ProviderKind};
pub use error::{IndexError, Result};
pub use feature::IndexFeature;
pub use filter::{keep_closest, GroupFilter};
pub use group::{LayerDescriptor, LayerRole, RasterGroup};
pub use mask::{MaskRaster, MaskRasterBuilder, MASK_NODATA, MASK_ON};
pub use provider::{Provider, SingleBoundaryProvider, TileCatalogProvider};
pub use resolver::{RasterGroupResolver, ResolveOptions};
pub use store::{GeoIndexStore, IndexSnapshot, IndexSnapshotBuilder, TileCacheStats};
