//! Sample values and zonal statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One pixel value and whether it is usable.
///
/// Invalid samples (out of bounds, nodata, unusable file, zero
/// denominator) carry `NaN`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BandSample {
    pub value: f64,
    pub valid: bool,
}

impl BandSample {
    pub fn valid(value: f64) -> Self {
        Self { value, valid: true }
    }

    pub fn invalid() -> Self {
        Self {
            value: f64::NAN,
            valid: false,
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.valid.then_some(self.value)
    }
}

impl PartialEq for BandSample {
    fn eq(&self, other: &Self) -> bool {
        match (self.valid, other.valid) {
            (true, true) => self.value == other.value,
            (false, false) => true,
            _ => false,
        }
    }
}

/// Statistics over the valid pixels of a circular window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZonalStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub stdev: f64,
    /// Mean absolute deviation from the mean.
    pub mad: f64,
}

impl ZonalStats {
    /// Compute statistics, or `None` when there are no values.
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let stdev = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let mad = values.iter().map(|v| (v - mean).abs()).sum::<f64>() / n;

        values.sort_by(f64::total_cmp);
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };

        Some(Self {
            count,
            min: values[0],
            max: values[count - 1],
            mean,
            median,
            stdev,
            mad,
        })
    }
}

/// Samples of one raster group at one point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSample {
    pub group_id: String,
    pub time: DateTime<Utc>,
    /// Raw bands and derived indices, by name.
    pub bands: BTreeMap<String, BandSample>,
    /// Quality bitmask from the FLAGS layer.
    pub flags: Option<u32>,
    /// Zonal statistics per raw band, when requested.
    pub stats: BTreeMap<String, ZonalStats>,
}

impl GroupSample {
    pub fn band(&self, name: &str) -> Option<&BandSample> {
        self.bands.get(name)
    }
}

/// Every group sampled at one point, in group order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSamples {
    pub lon: f64,
    pub lat: f64,
    pub samples: Vec<GroupSample>,
}
