//! Query sessions.
//!
//! Opening a session runs, on the calling thread and in order:
//!
//! 1. request validation: finite geometry, bands in the provider's catalog (no I/O)
//! 2. index loading for the query geometry
//! 3. group resolution
//! 4. URL / time-window / closest-time filtering
//!
//! The session is immutable afterwards, so sampling from many threads never
//! overlaps with loading or resolution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use geo_index::{GroupFilter, IndexSnapshot, Provider, RasterGroup, ResolveOptions};
use raster_common::{QueryGeometry, TimeWindow};
use raster_io::RasterIo;

use crate::algebra::BandAlgebra;
use crate::config::SamplerConfig;
use crate::error::SessionError;
use crate::sample::PointSamples;
use crate::sampler::ConcurrentSampler;

/// What a caller asks of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub geometry: QueryGeometry,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    #[serde(default)]
    pub closest_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url_substring: Option<String>,
    /// Raw band and index names. Empty samples every VALUE layer.
    #[serde(default)]
    pub bands: Vec<String>,
    /// Attach and sample the quality/bitmask layer.
    #[serde(default)]
    pub flags: bool,
    /// Compute zonal statistics around each point.
    #[serde(default)]
    pub zonal: bool,
}

impl QueryRequest {
    pub fn new(geometry: QueryGeometry) -> Self {
        Self {
            geometry,
            time_window: None,
            closest_time: None,
            url_substring: None,
            bands: Vec::new(),
            flags: false,
            zonal: false,
        }
    }

    pub fn with_bands(mut self, bands: &[&str]) -> Self {
        self.bands = bands.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_flags(mut self, flags: bool) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_zonal(mut self, zonal: bool) -> Self {
        self.zonal = zonal;
        self
    }

    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn with_closest_time(mut self, time: DateTime<Utc>) -> Self {
        self.closest_time = Some(time);
        self
    }

    pub fn with_url_substring(mut self, substring: &str) -> Self {
        self.url_substring = Some(substring.to_string());
        self
    }

    fn filter(&self) -> GroupFilter {
        GroupFilter {
            time_window: self.time_window,
            url_substring: self.url_substring.clone(),
            closest_time: self.closest_time,
        }
    }
}

/// Cancels a session from another thread.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop issuing new point samples. In-flight samples complete.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            tracing::info!(session = %self.id, "Session cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A resolved query, ready for concurrent sampling.
pub struct QuerySession {
    id: Uuid,
    provider_id: String,
    request: QueryRequest,
    snapshot: IndexSnapshot,
    groups: Vec<RasterGroup>,
    sampler: ConcurrentSampler,
    cancelled: Arc<AtomicBool>,
}

impl QuerySession {
    /// Validate, load, resolve and filter.
    pub fn open(
        provider: &Provider,
        algebra: &BandAlgebra,
        io: Arc<dyn RasterIo>,
        config: &SamplerConfig,
        request: QueryRequest,
    ) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        config.validate().map_err(SessionError::fault)?;
        request
            .geometry
            .validate()
            .map_err(|e| SessionError::InvalidGeometry(e.to_string()))?;

        let plan = algebra.plan(provider.band_catalog(), &request.bands)?;

        let snapshot = provider.load_index(&request.geometry)?;
        let options = ResolveOptions {
            wants_flags: request.flags,
            bands: plan.raw_bands.clone(),
        };
        let groups = provider.resolve_groups(&snapshot, &request.geometry, &options)?;

        let resolved = groups.len();
        let groups = request.filter().apply(groups);
        if groups.is_empty() {
            tracing::debug!(session = %id, resolved, "Every group filtered out");
            return Err(SessionError::NoRasters);
        }

        let sampler = ConcurrentSampler::new(io, plan, config, request.zonal)?;
        for (path, dataset) in provider.preopened_datasets() {
            sampler.handles().preseed(path, dataset);
        }

        tracing::info!(
            session = %id,
            provider = %provider.id(),
            features = snapshot.feature_count(),
            groups = groups.len(),
            "Opened query session"
        );

        Ok(Self {
            id,
            provider_id: provider.id().to_string(),
            request,
            snapshot,
            groups,
            sampler,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Resolved groups in resolution order.
    pub fn groups(&self) -> &[RasterGroup] {
        &self.groups
    }

    pub fn sampler(&self) -> &ConcurrentSampler {
        &self.sampler
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            cancelled: self.cancelled.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sample every group at one point.
    pub fn sample_point(&self, lon: f64, lat: f64) -> Result<PointSamples, SessionError> {
        if self.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        Ok(PointSamples {
            lon,
            lat,
            samples: self.sampler.sample_groups(&self.groups, lon, lat),
        })
    }

    /// Sample every group at each point.
    ///
    /// After a cancellation only the points already issued are returned.
    pub fn sample_points(&self, points: &[(f64, f64)]) -> Result<Vec<PointSamples>, SessionError> {
        if self.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let samples = self
            .sampler
            .sample_points(&self.groups, points, &self.cancelled);
        tracing::debug!(
            session = %self.id,
            requested = points.len(),
            sampled = samples.len(),
            "Sampled points"
        );
        Ok(samples)
    }
}
