//! Resolved raster groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a layer within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LayerRole {
    /// Primary measurement layer.
    Value,
    /// Quality/bitmask companion layer.
    Flags,
}

/// One file of a raster group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub role: LayerRole,
    /// Band name the layer is sampled as.
    pub band: String,
    /// Resolved dataset path.
    pub path: String,
    /// The layer holds a physical quantity (e.g. elevation) rather than a code.
    pub is_elevation: bool,
}

/// Companion layers describing one acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterGroup {
    pub id: String,
    /// Representative acquisition time.
    pub time: DateTime<Utc>,
    pub layers: Vec<LayerDescriptor>,
}

impl RasterGroup {
    pub fn value_layers(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter().filter(|l| l.role == LayerRole::Value)
    }

    pub fn flags_layer(&self) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|l| l.role == LayerRole::Flags)
    }

    /// First layer sampled as `band`.
    pub fn layer(&self, band: &str) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|l| l.band == band)
    }

    /// Primary VALUE layer path, used to collapse duplicate features.
    pub fn primary_path(&self) -> Option<&str> {
        self.value_layers().next().map(|l| l.path.as_str())
    }
}
