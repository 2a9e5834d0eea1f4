//! Post-resolution group filters.
//!
//! URL and time-window filters drop a whole group when any of its layers
//! fails; the closest-time filter keeps every group whose representative
//! time is nearest the target (ties are all kept).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use raster_common::TimeWindow;

use crate::group::RasterGroup;

/// Filters applied to resolved groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupFilter {
    /// Inclusive window on the representative time.
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    /// Every layer path must contain this substring.
    #[serde(default)]
    pub url_substring: Option<String>,
    /// Keep only the groups closest to this time.
    #[serde(default)]
    pub closest_time: Option<DateTime<Utc>>,
}

impl GroupFilter {
    pub fn is_empty(&self) -> bool {
        self.time_window.is_none() && self.url_substring.is_none() && self.closest_time.is_none()
    }

    pub fn apply(&self, mut groups: Vec<RasterGroup>) -> Vec<RasterGroup> {
        if let Some(substring) = &self.url_substring {
            groups.retain(|g| g.layers.iter().all(|l| l.path.contains(substring.as_str())));
        }
        if let Some(window) = &self.time_window {
            groups.retain(|g| window.contains(&g.time));
        }
        if let Some(target) = self.closest_time {
            groups = keep_closest(groups, target);
        }
        groups
    }
}

/// Keep the groups whose time is nearest `target`.
pub fn keep_closest(groups: Vec<RasterGroup>, target: DateTime<Utc>) -> Vec<RasterGroup> {
    let delta = |g: &RasterGroup| (g.time - target).num_milliseconds().unsigned_abs();
    let Some(min_delta) = groups.iter().map(delta).min() else {
        return groups;
    };
    groups.into_iter().filter(|g| delta(g) == min_delta).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{LayerDescriptor, LayerRole};
    use chrono::TimeZone;

    fn group(id: &str, day: u32, path: &str) -> RasterGroup {
        RasterGroup {
            id: id.to_string(),
            time: Utc.with_ymd_and_hms(2022, 3, day, 0, 0, 0).unwrap(),
            layers: vec![LayerDescriptor {
                role: LayerRole::Value,
                band: "dem".to_string(),
                path: path.to_string(),
                is_elevation: true,
            }],
        }
    }

    fn groups() -> Vec<RasterGroup> {
        vec![
            group("a", 1, "/data/arcticdem/s2s041/a_dem.tif"),
            group("b", 5, "/data/arcticdem/s2s042/b_dem.tif"),
            group("c", 9, "/data/arcticdem/s2s041/c_dem.tif"),
            group("d", 13, "/data/arcticdem/s2s041/d_dem.tif"),
        ]
    }

    fn ids(groups: &[RasterGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.id.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = GroupFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(groups()).len(), 4);
    }

    #[test]
    fn test_url_substring() {
        let filter = GroupFilter {
            url_substring: Some("s2s041".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(groups())), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_time_window_is_inclusive() {
        let filter = GroupFilter {
            time_window: Some(TimeWindow::parse("2022-03-05/2022-03-09").unwrap()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(groups())), vec!["b", "c"]);
    }

    #[test]
    fn test_closest_time_keeps_ties() {
        // Day 7 is equidistant from days 5 and 9
        let target = Utc.with_ymd_and_hms(2022, 3, 7, 0, 0, 0).unwrap();
        assert_eq!(ids(&keep_closest(groups(), target)), vec!["b", "c"]);

        let target = Utc.with_ymd_and_hms(2022, 3, 12, 0, 0, 0).unwrap();
        assert_eq!(ids(&keep_closest(groups(), target)), vec!["d"]);
    }

    #[test]
    fn test_filters_compose() {
        let filter = GroupFilter {
            url_substring: Some("s2s041".to_string()),
            closest_time: Some(Utc.with_ymd_and_hms(2022, 3, 6, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        // b is closest overall but removed by the URL filter first
        assert_eq!(ids(&filter.apply(groups())), vec!["c"]);
    }
}
