//! Session-scoped cache of opened dataset handles.
//!
//! Each path is opened at most once per cache. The map lock is held only to
//! find or insert a path's cell; the open itself runs inside that cell's
//! `OnceLock`, so only callers of the same path wait on it. A failed open is
//! remembered as unusable so the file is not retried within the session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use raster_io::{IoError, RasterDataset, RasterIo};

enum HandleSlot {
    Open(Arc<dyn RasterDataset>),
    Unusable(String),
}

impl HandleSlot {
    fn to_result(&self, path: &str) -> Result<Arc<dyn RasterDataset>, IoError> {
        match self {
            Self::Open(dataset) => Ok(dataset.clone()),
            Self::Unusable(message) => Err(IoError::open_failed(path, message.clone())),
        }
    }
}

/// Statistics for the handle cache.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HandleCacheStats {
    /// Lookups answered from an existing slot.
    pub hits: u64,
    /// Successful opens.
    pub opens: u64,
    /// Opens that failed and were marked unusable.
    pub failures: u64,
    pub entries: usize,
}

impl HandleCacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.opens + self.failures;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Opened datasets keyed by path, shared read-only across sampling threads.
pub struct DatasetHandleCache {
    io: Arc<dyn RasterIo>,
    slots: RwLock<HashMap<String, Arc<OnceLock<HandleSlot>>>>,
    hits: AtomicU64,
    opens: AtomicU64,
    failures: AtomicU64,
}

impl DatasetHandleCache {
    pub fn new(io: Arc<dyn RasterIo>) -> Self {
        Self {
            io,
            slots: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            opens: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Install an already opened dataset (e.g. an in-memory mask).
    pub fn preseed(&self, path: impl Into<String>, dataset: Arc<dyn RasterDataset>) {
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), Arc::new(OnceLock::from(HandleSlot::Open(dataset))));
    }

    /// The handle for `path`, opening it on first use.
    pub fn get(&self, path: &str) -> Result<Arc<dyn RasterDataset>, IoError> {
        let cell = self.cell(path);
        let mut opened = false;
        let slot = cell.get_or_init(|| {
            opened = true;
            self.open(path)
        });
        if !opened {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        slot.to_result(path)
    }

    /// The cell for `path`, inserted empty if absent.
    fn cell(&self, path: &str) -> Arc<OnceLock<HandleSlot>> {
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cell) = slots.get(path) {
                return cell.clone();
            }
        }
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.to_string())
            .or_default()
            .clone()
    }

    fn open(&self, path: &str) -> HandleSlot {
        match self.io.open(path) {
            Ok(dataset) => {
                self.opens.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(path = %path, "Opened dataset");
                HandleSlot::Open(dataset)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(path = %path, error = %e, "Dataset unusable for this session");
                HandleSlot::Unusable(e.to_string())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> HandleCacheStats {
        HandleCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
