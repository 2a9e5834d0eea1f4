//! Concurrent sampling of raster groups.
//!
//! Dataset handles come from a shared [`DatasetHandleCache`]; once a handle
//! is open, reads against it take no lock. Points are fanned out over a
//! rayon pool and, per point, groups are sampled in parallel. Output order
//! always follows input order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use geo_index::{LayerDescriptor, RasterGroup};
use raster_io::{RasterDataset, RasterIo};

use crate::algebra::SamplePlan;
use crate::config::SamplerConfig;
use crate::error::{Result, SamplerError};
use crate::handle_cache::DatasetHandleCache;
use crate::sample::{BandSample, GroupSample, PointSamples, ZonalStats};

/// Outcome of reading one layer at one point.
enum LayerRead {
    /// The file could not be opened this session.
    Unusable,
    OutOfBounds,
    Sampled {
        sample: BandSample,
        stats: Option<ZonalStats>,
    },
}

/// Samples raster groups for one session.
pub struct ConcurrentSampler {
    handles: DatasetHandleCache,
    plan: SamplePlan,
    zonal_radius: Option<f64>,
    pool: rayon::ThreadPool,
}

impl ConcurrentSampler {
    /// Create a sampler for a validated plan.
    ///
    /// Zonal statistics are computed with `config.zonal_radius` when `zonal` is set.
    pub fn new(
        io: Arc<dyn RasterIo>,
        plan: SamplePlan,
        config: &SamplerConfig,
        zonal: bool,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("raster-sampler-{}", i))
            .build()?;

        Ok(Self {
            handles: DatasetHandleCache::new(io),
            plan,
            zonal_radius: zonal.then_some(config.zonal_radius),
            pool,
        })
    }

    pub fn handles(&self) -> &DatasetHandleCache {
        &self.handles
    }

    pub fn plan(&self) -> &SamplePlan {
        &self.plan
    }

    /// Sample every planned band of `group` at `(lon, lat)`.
    ///
    /// A layer that is out of bounds, unusable or nodata yields an invalid
    /// band sample. Fails with [`SamplerError::Unusable`] when no layer of
    /// the group could be opened, and with [`SamplerError::OutOfBounds`]
    /// when the point is outside every layer that could.
    pub fn sample(&self, group: &RasterGroup, lon: f64, lat: f64) -> Result<GroupSample> {
        let mut bands = BTreeMap::new();
        let mut stats = BTreeMap::new();
        let mut in_bounds = false;
        let mut layers_read = 0;
        let mut unusable = 0;

        for layer in self.planned_layers(group) {
            layers_read += 1;
            let sample = match self.read_layer(&layer.path, lon, lat) {
                LayerRead::Sampled {
                    sample,
                    stats: zonal,
                } => {
                    in_bounds = true;
                    if let Some(zonal) = zonal {
                        stats.insert(layer.band.clone(), zonal);
                    }
                    sample
                }
                LayerRead::Unusable => {
                    unusable += 1;
                    BandSample::invalid()
                }
                LayerRead::OutOfBounds => BandSample::invalid(),
            };
            bands.insert(layer.band.clone(), sample);
        }

        // Planned bands the group has no layer for
        for band in &self.plan.raw_bands {
            bands
                .entry(band.clone())
                .or_insert_with(BandSample::invalid);
        }

        let mut flags = None;
        if let Some(layer) = group.flags_layer() {
            layers_read += 1;
            match self.read_layer(&layer.path, lon, lat) {
                LayerRead::Sampled { sample, .. } => {
                    in_bounds = true;
                    flags = sample.value().map(|v| v as u32);
                }
                LayerRead::Unusable => unusable += 1,
                LayerRead::OutOfBounds => {}
            }
        }

        if layers_read > 0 && unusable == layers_read {
            return Err(SamplerError::Unusable {
                group: group.id.clone(),
            });
        }
        if !in_bounds {
            return Err(SamplerError::OutOfBounds {
                group: group.id.clone(),
                lon,
                lat,
            });
        }

        for index in &self.plan.indices {
            let value = index.compute(&bands);
            bands.insert(index.name.clone(), value);
        }

        Ok(GroupSample {
            group_id: group.id.clone(),
            time: group.time,
            bands,
            flags,
            stats,
        })
    }

    /// Sample all groups at one point, in group order.
    ///
    /// Groups that do not cover the point are left out.
    pub fn sample_groups(&self, groups: &[RasterGroup], lon: f64, lat: f64) -> Vec<GroupSample> {
        self.pool.install(|| self.collect_groups(groups, lon, lat))
    }

    /// Sample all groups at many points, in point order.
    ///
    /// Points not yet started when `cancelled` is raised are skipped.
    pub fn sample_points(
        &self,
        groups: &[RasterGroup],
        points: &[(f64, f64)],
        cancelled: &AtomicBool,
    ) -> Vec<PointSamples> {
        self.pool.install(|| {
            points
                .par_iter()
                .filter_map(|&(lon, lat)| {
                    if cancelled.load(Ordering::Acquire) {
                        return None;
                    }
                    Some(PointSamples {
                        lon,
                        lat,
                        samples: self.collect_groups(groups, lon, lat),
                    })
                })
                .collect()
        })
    }

    fn collect_groups(&self, groups: &[RasterGroup], lon: f64, lat: f64) -> Vec<GroupSample> {
        groups
            .par_iter()
            .filter_map(|group| match self.sample(group, lon, lat) {
                Ok(sample) => Some(sample),
                Err(SamplerError::OutOfBounds { .. }) => {
                    tracing::trace!(group = %group.id, lon, lat, "Point outside group");
                    None
                }
                Err(e) => {
                    tracing::warn!(group = %group.id, error = %e, "Skipping group");
                    None
                }
            })
            .collect()
    }

    /// VALUE layers to read: the planned raw bands, or every VALUE layer
    /// when the plan names none.
    fn planned_layers<'a>(&'a self, group: &'a RasterGroup) -> impl Iterator<Item = &'a LayerDescriptor> {
        group.value_layers().filter(move |layer| {
            self.plan.raw_bands.is_empty() || self.plan.raw_bands.contains(&layer.band)
        })
    }

    fn read_layer(&self, path: &str, lon: f64, lat: f64) -> LayerRead {
        let Ok(dataset) = self.handles.get(path) else {
            return LayerRead::Unusable;
        };
        let info = dataset.info();
        let Some((row, col)) = info.pixel_for(lon, lat) else {
            return LayerRead::OutOfBounds;
        };

        let sample = match dataset.read_pixel(row, col) {
            Ok(value) if !info.is_nodata(value) => BandSample::valid(value),
            Ok(_) => BandSample::invalid(),
            Err(e) => {
                tracing::warn!(path = %path, row, col, error = %e, "Pixel read failed");
                BandSample::invalid()
            }
        };
        let stats = self
            .zonal_radius
            .and_then(|radius| zonal_stats(dataset.as_ref(), row, col, radius));

        LayerRead::Sampled { sample, stats }
    }
}

/// Statistics over the valid pixels within `radius` of `(row, col)`.
///
/// The window is clipped to the raster.
fn zonal_stats(dataset: &dyn RasterDataset, row: usize, col: usize, radius: f64) -> Option<ZonalStats> {
    let info = dataset.info();
    let (cell, _) = info.cell_size();
    let radius_cells = if radius > 0.0 { (radius / cell).ceil() } else { 0.0 };
    // The window never needs to reach past the raster
    let radius_px = radius_cells.min(info.height.max(info.width) as f64) as usize;

    let r0 = row.saturating_sub(radius_px);
    let c0 = col.saturating_sub(radius_px);
    let r1 = row.saturating_add(radius_px).min(info.height - 1);
    let c1 = col.saturating_add(radius_px).min(info.width - 1);
    let cols = c1 - c0 + 1;

    let window = match dataset.read_window(r0, c0, r1 - r0 + 1, cols) {
        Ok(window) => window,
        Err(e) => {
            tracing::warn!(path = %dataset.path(), error = %e, "Zonal window read failed");
            return None;
        }
    };

    let values = window
        .into_iter()
        .enumerate()
        .filter(|&(i, value)| {
            let dr = (r0 + i / cols) as f64 - row as f64;
            let dc = (c0 + i % cols) as f64 - col as f64;
            !info.is_nodata(value) && (dr * dr + dc * dc).sqrt() <= radius_cells
        })
        .map(|(_, value)| value)
        .collect();

    ZonalStats::from_values(values)
}
