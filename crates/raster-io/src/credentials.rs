//! Session-scoped credential cache for remote assets.
//!
//! Each asset id maps to a current credential generation. Publishing a new
//! credential decommissions the previous generation; a decommissioned
//! generation is destroyed as soon as its last outstanding lease is dropped,
//! so readers holding a lease never see their credential disappear mid-read.
//!
//! [`LeasedRasterIo`] opens remote paths under a lease that lives as long as
//! the returned dataset handle.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::{RasterDataset, RasterInfo, RasterIo};
use crate::error::{IoError, Result};

const REMOTE_SCHEMES: &[&str] = &["s3", "gs", "http", "https"];

/// Short-lived object-storage credential.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl Credential {
    /// True when the credential expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expiration.is_some_and(|exp| exp - now <= margin)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

struct Entry {
    credential: Arc<Credential>,
    leases: usize,
    decommissioned: bool,
}

#[derive(Default)]
struct Inner {
    current: HashMap<String, u64>,
    entries: HashMap<(String, u64), Entry>,
    next_generation: u64,
}

/// Cache of credentials keyed by asset id. Cloning shares the cache.
#[derive(Clone, Default)]
pub struct CredentialCache {
    inner: Arc<Mutex<Inner>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a new credential for `asset`, returning its generation.
    pub fn publish(&self, asset: &str, credential: Credential) -> u64 {
        let mut inner = self.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        if let Some(previous) = inner.current.insert(asset.to_string(), generation) {
            decommission(&mut inner, asset, previous);
        }
        inner.entries.insert(
            (asset.to_string(), generation),
            Entry {
                credential: Arc::new(credential),
                leases: 0,
                decommissioned: false,
            },
        );

        tracing::debug!(asset = %asset, generation, "Published credential");
        generation
    }

    /// Lease the current credential for `asset`.
    pub fn acquire(&self, asset: &str) -> Option<CredentialLease> {
        let mut inner = self.lock();
        let generation = *inner.current.get(asset)?;
        let entry = inner.entries.get_mut(&(asset.to_string(), generation))?;
        entry.leases += 1;

        Some(CredentialLease {
            cache: self.clone(),
            asset: asset.to_string(),
            generation,
            credential: Arc::clone(&entry.credential),
        })
    }

    /// Decommission the current credential without replacing it.
    pub fn retire(&self, asset: &str) {
        let mut inner = self.lock();
        if let Some(generation) = inner.current.remove(asset) {
            decommission(&mut inner, asset, generation);
        }
    }

    /// Number of generations still held for `asset` (current plus leased).
    pub fn live_generations(&self, asset: &str) -> usize {
        self.lock().entries.keys().filter(|(a, _)| a == asset).count()
    }

    fn release(&self, asset: &str, generation: u64) {
        let mut inner = self.lock();
        let key = (asset.to_string(), generation);
        let destroy = match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.leases = entry.leases.saturating_sub(1);
                entry.decommissioned && entry.leases == 0
            }
            None => false,
        };
        if destroy {
            inner.entries.remove(&key);
            tracing::debug!(asset = %asset, generation, "Destroyed decommissioned credential");
        }
    }
}

fn decommission(inner: &mut Inner, asset: &str, generation: u64) {
    let key = (asset.to_string(), generation);
    let unused = match inner.entries.get_mut(&key) {
        Some(entry) => {
            entry.decommissioned = true;
            entry.leases == 0
        }
        None => false,
    };
    if unused {
        inner.entries.remove(&key);
    }
}

/// A counted reference to one credential generation.
pub struct CredentialLease {
    cache: CredentialCache,
    asset: String,
    generation: u64,
    credential: Arc<Credential>,
}

impl CredentialLease {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Deref for CredentialLease {
    type Target = Credential;

    fn deref(&self) -> &Credential {
        &self.credential
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        self.cache.release(&self.asset, self.generation);
    }
}

/// Asset id of a remote path (`scheme://host`). Local paths have none.
pub fn asset_id(path: &str) -> Option<&str> {
    let (scheme, rest) = path.split_once("://")?;
    if !REMOTE_SCHEMES.contains(&scheme) {
        return None;
    }
    let host = rest.find('/').unwrap_or(rest.len());
    Some(&path[..scheme.len() + 3 + host])
}

/// Opens remote datasets under a credential lease.
///
/// Local paths are passed straight through.
pub struct LeasedRasterIo {
    inner: Arc<dyn RasterIo>,
    credentials: CredentialCache,
}

impl LeasedRasterIo {
    pub fn new(inner: Arc<dyn RasterIo>, credentials: CredentialCache) -> Self {
        Self { inner, credentials }
    }

    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }
}

impl RasterIo for LeasedRasterIo {
    fn open(&self, path: &str) -> Result<Arc<dyn RasterDataset>> {
        let Some(asset) = asset_id(path) else {
            return self.inner.open(path);
        };
        let lease = self
            .credentials
            .acquire(asset)
            .ok_or_else(|| IoError::open_failed(path, format!("no credential for {}", asset)))?;
        if lease.expires_within(Utc::now(), Duration::zero()) {
            return Err(IoError::open_failed(path, format!("credential for {} expired", asset)));
        }

        let dataset = self.inner.open(path)?;
        tracing::debug!(
            path = %path,
            asset = %asset,
            generation = lease.generation(),
            "Opened leased dataset"
        );
        Ok(Arc::new(LeasedDataset {
            dataset,
            _lease: lease,
        }))
    }
}

/// A dataset handle holding its credential lease.
struct LeasedDataset {
    dataset: Arc<dyn RasterDataset>,
    _lease: CredentialLease,
}

impl RasterDataset for LeasedDataset {
    fn path(&self) -> &str {
        self.dataset.path()
    }

    fn info(&self) -> &RasterInfo {
        self.dataset.info()
    }

    fn read_pixel(&self, row: usize, col: usize) -> Result<f64> {
        self.dataset.read_pixel(row, col)
    }

    fn read_window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<Vec<f64>> {
        self.dataset.read_window(row, col, rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRasterIo;

    fn credential(key: &str) -> Credential {
        Credential {
            access_key_id: key.to_string(),
            secret_access_key: "s3cr3t".to_string(),
            session_token: Some("token".to_string()),
            expiration: None,
        }
    }

    #[test]
    fn test_acquire_missing_asset() {
        let cache = CredentialCache::new();
        assert!(cache.acquire("s3://bucket").is_none());
    }

    #[test]
    fn test_publish_replaces_unleased_generation() {
        let cache = CredentialCache::new();
        cache.publish("asset", credential("A"));
        cache.publish("asset", credential("B"));
        assert_eq!(cache.live_generations("asset"), 1);
        assert_eq!(cache.acquire("asset").unwrap().access_key_id, "B");
    }

    #[test]
    fn test_leased_generation_outlives_publish() {
        let cache = CredentialCache::new();
        cache.publish("asset", credential("A"));
        let lease = cache.acquire("asset").unwrap();

        cache.publish("asset", credential("B"));
        assert_eq!(cache.live_generations("asset"), 2);
        assert_eq!(lease.access_key_id, "A");

        drop(lease);
        assert_eq!(cache.live_generations("asset"), 1);
    }

    #[test]
    fn test_current_generation_survives_lease_drop() {
        let cache = CredentialCache::new();
        cache.publish("asset", credential("A"));
        drop(cache.acquire("asset"));
        assert_eq!(cache.live_generations("asset"), 1);
    }

    #[test]
    fn test_retire() {
        let cache = CredentialCache::new();
        cache.publish("asset", credential("A"));
        let lease = cache.acquire("asset").unwrap();
        cache.retire("asset");
        assert!(cache.acquire("asset").is_none());
        assert_eq!(cache.live_generations("asset"), 1);
        drop(lease);
        assert_eq!(cache.live_generations("asset"), 0);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let text = format!("{:?}", credential("AKIA"));
        assert!(text.contains("AKIA"));
        assert!(!text.contains("s3cr3t"));
        assert!(!text.contains("token\""));
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let mut cred = credential("A");
        assert!(!cred.expires_within(now, Duration::minutes(5)));
        cred.expiration = Some(now + Duration::minutes(2));
        assert!(cred.expires_within(now, Duration::minutes(5)));
        assert!(!cred.expires_within(now, Duration::minutes(1)));
    }

    #[test]
    fn test_asset_id() {
        assert_eq!(asset_id("s3://bucket/a/b.tif"), Some("s3://bucket"));
        assert_eq!(asset_id("https://data.example.org"), Some("https://data.example.org"));
        assert_eq!(asset_id("/data/strips/a.tif"), None);
        assert_eq!(asset_id("mask://aoi"), None);
    }

    fn leased_io() -> (LeasedRasterIo, Arc<MemoryRasterIo>) {
        let memory = Arc::new(MemoryRasterIo::new());
        let info = RasterInfo::north_up(0.0, 1.0, 0.5, 2, 2);
        memory.insert_constant("s3://bucket/a.tif", info.clone(), 4.0).unwrap();
        memory.insert_constant("/local/a.tif", info, 2.0).unwrap();
        (LeasedRasterIo::new(memory.clone(), CredentialCache::new()), memory)
    }

    #[test]
    fn test_remote_open_needs_credential() {
        let (io, memory) = leased_io();
        assert!(matches!(
            io.open("s3://bucket/a.tif"),
            Err(IoError::OpenFailed { .. })
        ));
        assert_eq!(memory.stats().opens, 0);

        // Local paths need none
        assert_eq!(io.open("/local/a.tif").unwrap().read_pixel(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_expired_credential_is_refused() {
        let (io, _) = leased_io();
        let mut expired = credential("A");
        expired.expiration = Some(Utc::now() - Duration::minutes(1));
        io.credentials().publish("s3://bucket", expired);
        assert!(io.open("s3://bucket/a.tif").is_err());
    }

    #[test]
    fn test_handle_holds_lease_until_dropped() {
        let (io, _) = leased_io();
        io.credentials().publish("s3://bucket", credential("A"));

        let dataset = io.open("s3://bucket/a.tif").unwrap();
        assert_eq!(dataset.path(), "s3://bucket/a.tif");
        assert_eq!(dataset.read_pixel(1, 1).unwrap(), 4.0);

        // A refresh while the handle is open keeps the old generation alive
        io.credentials().publish("s3://bucket", credential("B"));
        assert_eq!(io.credentials().live_generations("s3://bucket"), 2);

        drop(dataset);
        assert_eq!(io.credentials().live_generations("s3://bucket"), 1);
    }
}
