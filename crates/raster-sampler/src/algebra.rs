//! Band catalogs and derived indices.
//!
//! Every provider registers the raw band names it serves and the
//! normalized-difference indices it can derive from them. Requests are
//! checked against the catalog before any I/O is issued.
//!
//! | catalog     | indices                                              |
//! |-------------|------------------------------------------------------|
//! | `arcticdem` | none                                                 |
//! | `rema`      | none                                                 |
//! | `hls-l30`   | `NDSI` (B03,B06), `NDVI` (B05,B04), `NDWI` (B05,B06) |
//! | `hls-s30`   | `NDSI` (B03,B11), `NDVI` (B8A,B04), `NDWI` (B8A,B11) |
//! | `mask`      | none                                                 |

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SamplerError};
use crate::sample::BandSample;

/// `(a - b) / (a + b)` over two raw bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedIndex {
    pub name: String,
    pub a: String,
    pub b: String,
}

impl DerivedIndex {
    pub fn new(name: &str, a: &str, b: &str) -> Self {
        Self {
            name: name.to_string(),
            a: a.to_string(),
            b: b.to_string(),
        }
    }

    /// Evaluate from sampled raw bands.
    ///
    /// A missing or invalid input, or a zero denominator, gives an invalid sample.
    pub fn compute(&self, bands: &BTreeMap<String, BandSample>) -> BandSample {
        let (Some(a), Some(b)) = (
            bands.get(&self.a).and_then(BandSample::value),
            bands.get(&self.b).and_then(BandSample::value),
        ) else {
            return BandSample::invalid();
        };

        let sum = a + b;
        if sum == 0.0 {
            return BandSample::invalid();
        }
        let value = (a - b) / sum;
        if value.is_finite() {
            BandSample::valid(value)
        } else {
            BandSample::invalid()
        }
    }
}

/// Raw bands and indices served by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCatalog {
    pub id: String,
    pub bands: Vec<String>,
    #[serde(default)]
    pub indices: Vec<DerivedIndex>,
}

impl BandCatalog {
    pub fn new(id: &str, bands: &[&str], indices: Vec<DerivedIndex>) -> Self {
        Self {
            id: id.to_string(),
            bands: bands.iter().map(|b| b.to_string()).collect(),
            indices,
        }
    }

    /// Raw band lookup, case-sensitive.
    pub fn has_band(&self, band: &str) -> bool {
        self.bands.iter().any(|b| b == band)
    }

    /// Index lookup, case-insensitive.
    pub fn index(&self, name: &str) -> Option<&DerivedIndex> {
        self.indices
            .iter()
            .find(|index| index.name.eq_ignore_ascii_case(name))
    }

    fn strip(id: &str) -> Self {
        Self::new(id, &["dem", "bitmask"], Vec::new())
    }

    fn landsat8() -> Self {
        Self::new(
            "hls-l30",
            &[
                "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B09", "B10", "B11", "Fmask",
                "SAA", "SZA", "VAA", "VZA",
            ],
            vec![
                DerivedIndex::new("NDSI", "B03", "B06"),
                DerivedIndex::new("NDVI", "B05", "B04"),
                DerivedIndex::new("NDWI", "B05", "B06"),
            ],
        )
    }

    fn sentinel2() -> Self {
        Self::new(
            "hls-s30",
            &[
                "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B09", "B10", "B11",
                "B12", "B8A", "Fmask", "SAA", "SZA", "VAA", "VZA",
            ],
            vec![
                DerivedIndex::new("NDSI", "B03", "B11"),
                DerivedIndex::new("NDVI", "B8A", "B04"),
                DerivedIndex::new("NDWI", "B8A", "B11"),
            ],
        )
    }
}

/// Raw bands to sample and indices to derive for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplePlan {
    /// Unique raw bands in request order, index inputs included.
    pub raw_bands: Vec<String>,
    pub indices: Vec<DerivedIndex>,
}

impl SamplePlan {
    pub fn is_empty(&self) -> bool {
        self.raw_bands.is_empty() && self.indices.is_empty()
    }

    fn push_band(&mut self, band: &str) {
        if !self.raw_bands.iter().any(|b| b == band) {
            self.raw_bands.push(band.to_string());
        }
    }
}

/// Registry of band catalogs.
#[derive(Debug, Clone)]
pub struct BandAlgebra {
    catalogs: HashMap<String, BandCatalog>,
}

impl Default for BandAlgebra {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BandAlgebra {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            catalogs: HashMap::new(),
        }
    }

    /// Registry with the built-in provider catalogs.
    pub fn builtin() -> Self {
        let mut algebra = Self::new();
        algebra.register(BandCatalog::strip("arcticdem"));
        algebra.register(BandCatalog::strip("rema"));
        algebra.register(BandCatalog::landsat8());
        algebra.register(BandCatalog::sentinel2());
        algebra.register(BandCatalog::new("mask", &["mask"], Vec::new()));
        algebra
    }

    /// Add or replace a catalog.
    pub fn register(&mut self, catalog: BandCatalog) {
        self.catalogs.insert(catalog.id.clone(), catalog);
    }

    pub fn catalog(&self, id: &str) -> Option<&BandCatalog> {
        self.catalogs.get(id)
    }

    /// Whether `name` is a raw band or a fully backed index of the catalog.
    pub fn validate(&self, catalog_id: &str, name: &str) -> bool {
        let Some(catalog) = self.catalog(catalog_id) else {
            return false;
        };
        if catalog.has_band(name) {
            return true;
        }
        catalog
            .index(name)
            .is_some_and(|index| catalog.has_band(&index.a) && catalog.has_band(&index.b))
    }

    /// Resolve request terms into raw bands and indices.
    pub fn plan(&self, catalog_id: &str, terms: &[String]) -> Result<SamplePlan> {
        let mut plan = SamplePlan::default();

        for term in terms {
            let catalog = self
                .catalog(catalog_id)
                .ok_or_else(|| SamplerError::BandNotFound(term.clone()))?;

            if catalog.has_band(term) {
                plan.push_band(term);
                continue;
            }

            let index = catalog
                .index(term)
                .ok_or_else(|| SamplerError::BandNotFound(term.clone()))?;
            for input in [&index.a, &index.b] {
                if !catalog.has_band(input) {
                    return Err(SamplerError::BandNotFound(input.clone()));
                }
            }
            plan.push_band(&index.a);
            plan.push_band(&index.b);
            if !plan.indices.contains(index) {
                plan.indices.push(index.clone());
            }
        }

        Ok(plan)
    }

    /// Evaluate a registered index from sampled bands.
    pub fn compute(
        &self,
        catalog_id: &str,
        index_name: &str,
        bands: &BTreeMap<String, BandSample>,
    ) -> Result<BandSample> {
        let index = self
            .catalog(catalog_id)
            .and_then(|catalog| catalog.index(index_name))
            .ok_or_else(|| SamplerError::UnknownIndex(index_name.to_string()))?;
        Ok(index.compute(bands))
    }
}
