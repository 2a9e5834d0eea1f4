//! Raster group resolution.
//!
//! Turns the index features intersecting a query into raster groups:
//! the feature's file reference is rebased under the local catalog root at
//! the provider marker, companion layers are derived from it, and the
//! representative time is the mean of the provider's timestamp fields.
//! A feature that cannot be resolved is logged and skipped; it never aborts
//! the resolution of the others.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};

use raster_common::{mean_timestamp, QueryGeometry};

use crate::config::ProviderConfig;
use crate::error::{IndexError, Result};
use crate::feature::IndexFeature;
use crate::group::{LayerDescriptor, LayerRole, RasterGroup};
use crate::store::IndexSnapshot;

/// Per-query resolution options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Attach the FLAGS companion layer.
    pub wants_flags: bool,
    /// Raw bands to attach for multi-band providers. Empty means the
    /// provider's default value band.
    pub bands: Vec<String>,
}

/// Resolves index features into raster groups for one provider.
#[derive(Debug, Clone)]
pub struct RasterGroupResolver {
    catalog_root: String,
    marker: String,
    reference_field: String,
    time_fields: Vec<String>,
    value_suffix: Option<String>,
    flags_suffix: Option<String>,
    value_band: String,
    flags_band: String,
    band_placeholder: Option<String>,
    url_substring: Option<String>,
    is_elevation: bool,
    require_flags: bool,
}

impl RasterGroupResolver {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            catalog_root: config.catalog_root.clone(),
            marker: config.marker.clone(),
            reference_field: config.reference_field.clone(),
            time_fields: config.time_fields.clone(),
            value_suffix: config.value_suffix.clone(),
            flags_suffix: config.flags_suffix.clone(),
            value_band: config.value_band.clone(),
            flags_band: config.flags_band.clone(),
            band_placeholder: config.band_placeholder.clone(),
            url_substring: config.url_substring.clone(),
            is_elevation: config.is_elevation,
            require_flags: config.require_flags,
        }
    }

    /// Resolve the snapshot's features intersecting `geometry` into groups.
    ///
    /// Groups keep feature order. A feature repeated across tiles resolves
    /// once (groups are unique by primary layer path).
    pub fn resolve(
        &self,
        snapshot: &IndexSnapshot,
        geometry: &QueryGeometry,
        options: &ResolveOptions,
    ) -> Result<Vec<RasterGroup>> {
        let query = geometry.to_geo();
        let mut seen = HashSet::new();
        let mut groups = Vec::new();

        for feature in snapshot.features() {
            if !feature.intersects(&query) {
                continue;
            }

            match self.resolve_feature(feature, options) {
                Ok(Some(group)) => {
                    let primary = group.primary_path().unwrap_or_default().to_string();
                    if seen.insert(primary) {
                        groups.push(group);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(feature = %feature.label(), error = %e, "Skipping index feature");
                }
            }
        }

        tracing::debug!(groups = groups.len(), "Resolved raster groups");

        if groups.is_empty() {
            return Err(IndexError::GroupResolutionEmpty);
        }
        Ok(groups)
    }

    /// Resolve a single feature. `Ok(None)` means the feature was skipped by policy.
    pub fn resolve_feature(
        &self,
        feature: &IndexFeature,
        options: &ResolveOptions,
    ) -> Result<Option<RasterGroup>> {
        let Some(reference) = feature
            .field_str(&self.reference_field)
            .filter(|s| !s.is_empty())
        else {
            tracing::debug!(
                feature = %feature.label(),
                field = %self.reference_field,
                "Feature has no file reference"
            );
            return Ok(None);
        };

        let path = self.rebase(reference)?;

        if let Some(substring) = &self.url_substring {
            if !path.contains(substring.as_str()) {
                return Ok(None);
            }
        }

        let time = self.representative_time(feature)?;

        let layers = match self
            .band_placeholder
            .as_deref()
            .filter(|placeholder| path.contains(placeholder))
        {
            Some(placeholder) => self.band_layers(&path, placeholder, options),
            None => self.suffix_layers(&path, options),
        };
        let Some(layers) = layers else {
            tracing::warn!(
                feature = %feature.label(),
                path = %path,
                "Flags layer required but not derivable"
            );
            return Ok(None);
        };

        let id = feature.id.clone().unwrap_or_else(|| file_stem(&path));
        Ok(Some(RasterGroup { id, time, layers }))
    }

    /// Rebase a file reference under the catalog root at the marker token.
    pub fn rebase(&self, reference: &str) -> Result<String> {
        let pos = reference
            .find(self.marker.as_str())
            .ok_or_else(|| IndexError::PathResolution {
                marker: self.marker.clone(),
                reference: reference.to_string(),
            })?;

        let root = self.catalog_root.trim_end_matches('/');
        Ok(format!("{}/{}", root, &reference[pos..]))
    }

    /// Mean of the configured timestamp fields.
    pub fn representative_time(&self, feature: &IndexFeature) -> Result<DateTime<Utc>> {
        let invalid = |message: String| IndexError::InvalidTimestamps {
            feature: feature.label(),
            message,
        };

        if self.time_fields.len() < 2 {
            return Err(invalid(format!(
                "{} timestamp field(s) configured, need at least 2",
                self.time_fields.len()
            )));
        }

        let mut times = Vec::with_capacity(self.time_fields.len());
        for field in &self.time_fields {
            let time = feature
                .field_datetime(field)
                .ok_or_else(|| invalid(format!("missing field '{}'", field)))?
                .map_err(|e| invalid(e.to_string()))?;
            times.push(time);
        }

        mean_timestamp(&times).ok_or_else(|| invalid("timestamp out of range".to_string()))
    }

    /// One VALUE layer per band plus an optional FLAGS layer, by placeholder substitution.
    fn band_layers(
        &self,
        path: &str,
        placeholder: &str,
        options: &ResolveOptions,
    ) -> Option<Vec<LayerDescriptor>> {
        let bands: Vec<&str> = if options.bands.is_empty() {
            vec![self.value_band.as_str()]
        } else {
            options.bands.iter().map(String::as_str).collect()
        };

        let mut layers: Vec<LayerDescriptor> = bands
            .into_iter()
            .map(|band| LayerDescriptor {
                role: LayerRole::Value,
                band: band.to_string(),
                path: path.replace(placeholder, band),
                is_elevation: self.is_elevation,
            })
            .collect();

        if options.wants_flags {
            layers.push(LayerDescriptor {
                role: LayerRole::Flags,
                band: self.flags_band.clone(),
                path: path.replace(placeholder, &self.flags_band),
                is_elevation: false,
            });
        }
        Some(layers)
    }

    /// Single VALUE layer plus an optional FLAGS layer, by suffix substitution.
    ///
    /// `None` when flags are required but the suffix does not match.
    fn suffix_layers(&self, path: &str, options: &ResolveOptions) -> Option<Vec<LayerDescriptor>> {
        let mut layers = vec![LayerDescriptor {
            role: LayerRole::Value,
            band: self.value_band.clone(),
            path: path.to_string(),
            is_elevation: self.is_elevation,
        }];

        if options.wants_flags {
            match self.flags_path(path) {
                Some(flags_path) => layers.push(LayerDescriptor {
                    role: LayerRole::Flags,
                    band: self.flags_band.clone(),
                    path: flags_path,
                    is_elevation: false,
                }),
                None if self.require_flags => return None,
                None => {
                    tracing::debug!(path = %path, "No flags suffix match, serving value layer only");
                }
            }
        }
        Some(layers)
    }

    /// Replace the last occurrence of the value suffix with the flags suffix.
    pub fn flags_path(&self, path: &str) -> Option<String> {
        let value_suffix = self.value_suffix.as_deref()?;
        let flags_suffix = self.flags_suffix.as_deref()?;
        let pos = path.rfind(value_suffix)?;

        let mut flags_path = path.to_string();
        flags_path.replace_range(pos..pos + value_suffix.len(), flags_suffix);
        Some(flags_path)
    }
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo::{Geometry, Point};
    use serde_json::{Map, Value};
    use std::path::PathBuf;

    fn resolver() -> RasterGroupResolver {
        RasterGroupResolver::new(&ProviderConfig::arcticdem_strips("/data/pgc"))
    }

    fn strip(dem: &str, start: &str, end: &str) -> IndexFeature {
        let mut properties = Map::new();
        properties.insert("Dem".into(), Value::from(dem));
        properties.insert("start_datetime".into(), Value::from(start));
        properties.insert("end_datetime".into(), Value::from(end));
        IndexFeature {
            id: None,
            geometry: Geometry::Point(Point::new(-120.3, 61.4)),
            properties,
            source: PathBuf::from("/idx/n61w121.geojson"),
        }
    }

    #[test]
    fn test_rebase_at_marker() {
        let r = resolver();
        assert_eq!(
            r.rebase("/vsis3/pgc-opendata-dems/arcticdem/strips/s2s041/2m/n61w121/a_dem.tif")
                .unwrap(),
            "/data/pgc/arcticdem/strips/s2s041/2m/n61w121/a_dem.tif"
        );
        assert!(matches!(
            r.rebase("/vsis3/other/strip_dem.tif"),
            Err(IndexError::PathResolution { .. })
        ));
    }

    #[test]
    fn test_flags_path_replaces_last_suffix() {
        let r = resolver();
        assert_eq!(
            r.flags_path("/d/x_dem.tif_dem.tif").as_deref(),
            Some("/d/x_dem.tif_bitmask.tif")
        );
        assert_eq!(r.flags_path("/d/x_matchtag.tif"), None);
    }

    #[test]
    fn test_representative_time_is_mean() {
        let r = resolver();
        let f = strip(
            "/x/arcticdem/a_dem.tif",
            "2021-07-01T10:00:00Z",
            "2021-07-01T12:30:00Z",
        );
        let t = r.representative_time(&f).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2021, 7, 1, 11, 15, 0).unwrap());
    }

    #[test]
    fn test_missing_timestamp_is_invalid() {
        let r = resolver();
        let mut f = strip("/x/arcticdem/a_dem.tif", "2021-07-01", "2021-07-02");
        f.properties.remove("end_datetime");
        assert!(matches!(
            r.representative_time(&f),
            Err(IndexError::InvalidTimestamps { .. })
        ));
    }

    #[test]
    fn test_single_time_field_is_rejected() {
        let mut config = ProviderConfig::arcticdem_strips("/data/pgc");
        config.time_fields = vec!["start_datetime".to_string()];
        let r = RasterGroupResolver::new(&config);
        let f = strip("/x/arcticdem/a_dem.tif", "2021-07-01", "2021-07-02");
        assert!(r.representative_time(&f).is_err());
    }

    #[test]
    fn test_resolve_feature_with_flags() {
        let r = resolver();
        let f = strip(
            "/x/arcticdem/n61w121/SETSM_a_dem.tif",
            "2021-07-01",
            "2021-07-03",
        );
        let options = ResolveOptions {
            wants_flags: true,
            ..Default::default()
        };
        let group = r.resolve_feature(&f, &options).unwrap().unwrap();

        assert_eq!(group.id, "SETSM_a_dem");
        assert_eq!(group.time, Utc.with_ymd_and_hms(2021, 7, 2, 0, 0, 0).unwrap());
        assert_eq!(
            group.primary_path(),
            Some("/data/pgc/arcticdem/n61w121/SETSM_a_dem.tif")
        );
        let flags = group.flags_layer().unwrap();
        assert_eq!(flags.band, "bitmask");
        assert_eq!(flags.path, "/data/pgc/arcticdem/n61w121/SETSM_a_bitmask.tif");
        assert!(group.value_layers().all(|l| l.is_elevation));
        assert!(!flags.is_elevation);
    }

    #[test]
    fn test_flags_suffix_miss_policy() {
        let f = strip("/x/arcticdem/a_ortho.tif", "2021-07-01", "2021-07-03");
        let options = ResolveOptions {
            wants_flags: true,
            ..Default::default()
        };

        let group = resolver().resolve_feature(&f, &options).unwrap().unwrap();
        assert_eq!(group.layers.len(), 1);
        assert!(group.flags_layer().is_none());

        let mut config = ProviderConfig::arcticdem_strips("/data/pgc");
        config.require_flags = true;
        let strict = RasterGroupResolver::new(&config);
        assert!(strict.resolve_feature(&f, &options).unwrap().is_none());
    }

    #[test]
    fn test_band_placeholder_layers() {
        let r = RasterGroupResolver::new(&ProviderConfig::landsat_hls(
            "/data/hls",
            crate::config::HlsSensor::Landsat8,
        ));
        let mut properties = Map::new();
        properties.insert(
            "url".into(),
            Value::from("s3://lp-prod/hls/HLS.L30.T10UDV.2021001T190229.v2.0.{band}.tif"),
        );
        properties.insert("start_datetime".into(), Value::from("2021-01-01T19:02:29Z"));
        properties.insert("end_datetime".into(), Value::from("2021-01-01T19:02:29Z"));
        let f = IndexFeature {
            id: Some("HLS.L30.T10UDV.2021001T190229".to_string()),
            geometry: Geometry::Point(Point::new(0.0, 0.0)),
            properties,
            source: PathBuf::from("hls.geojson"),
        };

        let options = ResolveOptions {
            wants_flags: true,
            bands: vec!["B04".to_string(), "B05".to_string()],
        };
        let group = r.resolve_feature(&f, &options).unwrap().unwrap();
        let paths: Vec<&str> = group.layers.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/data/hls/hls/HLS.L30.T10UDV.2021001T190229.v2.0.B04.tif",
                "/data/hls/hls/HLS.L30.T10UDV.2021001T190229.v2.0.B05.tif",
                "/data/hls/hls/HLS.L30.T10UDV.2021001T190229.v2.0.Fmask.tif",
            ]
        );
        assert_eq!(group.flags_layer().map(|l| l.band.as_str()), Some("Fmask"));
    }

    #[test]
    fn test_url_substring_skips_other_sensor() {
        let r = RasterGroupResolver::new(&ProviderConfig::landsat_hls(
            "/data/hls",
            crate::config::HlsSensor::Sentinel2,
        ));
        let mut properties = Map::new();
        properties.insert("url".into(), Value::from("s3://lp/hls/HLS.L30.T1.v2.0.{band}.tif"));
        properties.insert("start_datetime".into(), Value::from("2021-01-01"));
        properties.insert("end_datetime".into(), Value::from("2021-01-01"));
        let f = IndexFeature {
            id: None,
            geometry: Geometry::Point(Point::new(0.0, 0.0)),
            properties,
            source: PathBuf::from("hls.geojson"),
        };
        assert!(r
            .resolve_feature(&f, &ResolveOptions::default())
            .unwrap()
            .is_none());
    }
}
