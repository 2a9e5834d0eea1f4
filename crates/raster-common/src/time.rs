//! Timestamp parsing and acquisition time windows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimeParseError;

/// Parse an acquisition timestamp.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (assumed UTC), or a bare date.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Arithmetic mean of timestamps at millisecond resolution.
///
/// Returns `None` for an empty slice.
pub fn mean_timestamp(times: &[DateTime<Utc>]) -> Option<DateTime<Utc>> {
    if times.is_empty() {
        return None;
    }
    let sum: i128 = times.iter().map(|t| t.timestamp_millis() as i128).sum();
    let mean = sum / times.len() as i128;
    DateTime::from_timestamp_millis(mean as i64)
}

/// Inclusive acquisition time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Self, TimeParseError> {
        if start > stop {
            return Err(TimeParseError::InvertedWindow {
                start: start.to_rfc3339(),
                stop: stop.to_rfc3339(),
            });
        }
        Ok(Self { start, stop })
    }

    /// Parse a `start/stop` interval.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let (start, stop) = s
            .split_once('/')
            .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?;
        Self::new(parse_timestamp(start)?, parse_timestamp(stop)?)
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.stop
    }
}
