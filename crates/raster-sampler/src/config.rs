//! Configuration for the sampler.

use serde::{Deserialize, Serialize};

/// Configuration for concurrent sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Size of the sampling thread pool.
    pub worker_threads: usize,

    /// Radius for zonal statistics, in dataset units. Zero samples the
    /// containing pixel only.
    pub zonal_radius: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            zonal_radius: 0.0,
        }
    }
}

impl SamplerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_SAMPLER_THREADS") {
            if let Ok(threads) = val.parse() {
                config.worker_threads = threads;
            }
        }

        if let Ok(val) = std::env::var("RASTER_SAMPLER_ZONAL_RADIUS") {
            if let Ok(radius) = val.parse() {
                config.zonal_radius = radius;
            }
        }

        config
    }

    pub fn with_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_zonal_radius(mut self, zonal_radius: f64) -> Self {
        self.zonal_radius = zonal_radius;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_threads == 0 {
            return Err("worker_threads must be > 0".to_string());
        }

        if self.worker_threads > 1024 {
            return Err("worker_threads must be <= 1024".to_string());
        }

        if !self.zonal_radius.is_finite() || self.zonal_radius < 0.0 {
            return Err("zonal_radius must be a finite value >= 0".to_string());
        }

        Ok(())
    }
}
