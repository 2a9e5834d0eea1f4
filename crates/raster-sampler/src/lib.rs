//! Band algebra, dataset handle caching and concurrent raster sampling.
//!
//! A [`QuerySession`] resolves a provider's raster groups for one query and
//! then samples them from a worker pool:
//!
//! ```rust,ignore
//! use raster_sampler::{BandAlgebra, QueryRequest, QuerySession, SamplerConfig};
//!
//! let request = QueryRequest::new(QueryGeometry::point(-120.3, 61.4)).with_flags(true);
//! let session = QuerySession::open(&provider, &BandAlgebra::builtin(), io, &SamplerConfig::from_env(), request)?;
//! let samples = session.sample_point(-120.3, 61.4)?;
//! ```

pub mod algebra;
pub mod config;
pub mod error;
pub mod handle_cache;
pub mod sample;
pub mod sampler;
pub mod session;

pub use algebra::{BandAlgebra, BandCatalog, DerivedIndex, SamplePlan};
pub use config::SamplerConfig;
pub use error::{ErrorClass, Result, SamplerError, SessionError};
pub use handle_cache::{DatasetHandleCache, HandleCacheStats};
pub use sample::{BandSample, GroupSample, PointSamples, ZonalStats};
pub use sampler::ConcurrentSampler;
pub use session::{QueryRequest, QuerySession, SessionHandle};
