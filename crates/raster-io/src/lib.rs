//! Raster and vector I/O boundary.
//!
//! This crate owns everything that touches file bytes:
//!
//! - [`RasterIo`] / [`RasterDataset`]: opening rasters and reading pixel windows,
//!   backed by Zarr V3 on disk ([`ZarrRasterIo`]) or memory ([`MemoryRasterIo`])
//! - [`VectorIo`]: GeoJSON feature layers
//! - [`rasterize`]: burning polygons into a byte grid
//! - [`ZarrRasterWriter`]: staging rasters on disk
//! - [`CredentialCache`], [`LeasedRasterIo`]: leased credentials for remote assets

pub mod config;
pub mod credentials;
pub mod dataset;
pub mod error;
pub mod memory;
pub mod rasterize;
pub mod vector;
pub mod writer;
pub mod zarr;

pub use config::{ZarrCompression, ZarrWriterConfig};
pub use credentials::{asset_id, Credential, CredentialCache, CredentialLease, LeasedRasterIo};
pub use dataset::{GeoTransform, RasterDataset, RasterInfo, RasterIo};
pub use error::{IoError, Result};
pub use memory::{IoStats, MemoryDataset, MemoryRasterIo};
pub use rasterize::{rasterize, BurnGrid};
pub use vector::{parse_geojson, GeoJsonVectorIo, VectorFeature, VectorIo, VectorLayer};
pub use writer::{ZarrRasterWriter, ZarrWriteResult};
pub use zarr::{ZarrDataset, ZarrRasterIo};
