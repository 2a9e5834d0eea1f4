//! In-memory raster backend.
//!
//! Serves rasters registered up front and counts every open and read,
//! so callers can assert how much I/O a query actually performed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::dataset::{RasterDataset, RasterInfo, RasterIo};
use crate::error::{IoError, Result};

/// Snapshot of I/O counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Successful and failed open attempts.
    pub opens: u64,
    /// Pixel window reads.
    pub reads: u64,
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicU64,
    reads: AtomicU64,
}

/// A raster held entirely in memory.
pub struct MemoryDataset {
    path: String,
    info: RasterInfo,
    data: Vec<f32>,
    counters: Arc<Counters>,
}

impl MemoryDataset {
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

impl RasterDataset for MemoryDataset {
    fn path(&self) -> &str {
        &self.path
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<Vec<f64>> {
        self.info.check_window(row, col, rows, cols)?;
        self.counters.reads.fetch_add(1, Ordering::Relaxed);

        let mut out = Vec::with_capacity(rows * cols);
        for r in row..row + rows {
            let start = r * self.info.width + col;
            out.extend(self.data[start..start + cols].iter().map(|&v| f64::from(v)));
        }
        Ok(out)
    }
}

/// [`RasterIo`] serving registered in-memory rasters by path.
#[derive(Default)]
pub struct MemoryRasterIo {
    datasets: RwLock<HashMap<String, Arc<MemoryDataset>>>,
    counters: Arc<Counters>,
}

impl MemoryRasterIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raster under `path`, replacing any previous one.
    pub fn insert(&self, path: impl Into<String>, info: RasterInfo, data: Vec<f32>) -> Result<()> {
        let path = path.into();
        info.validate()
            .map_err(|msg| IoError::invalid_metadata(&path, msg))?;
        if data.len() != info.width * info.height {
            return Err(IoError::invalid_metadata(
                &path,
                format!(
                    "data length {} does not match {}x{}",
                    data.len(),
                    info.width,
                    info.height
                ),
            ));
        }

        let dataset = Arc::new(MemoryDataset {
            path: path.clone(),
            info,
            data,
            counters: Arc::clone(&self.counters),
        });
        self.datasets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, dataset);
        Ok(())
    }

    /// Register a raster filled with a single value.
    pub fn insert_constant(&self, path: impl Into<String>, info: RasterInfo, value: f32) -> Result<()> {
        let data = vec![value; info.width * info.height];
        self.insert(path, info, data)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.datasets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }

    pub fn stats(&self) -> IoStats {
        IoStats {
            opens: self.counters.opens.load(Ordering::Relaxed),
            reads: self.counters.reads.load(Ordering::Relaxed),
        }
    }
}

impl RasterIo for MemoryRasterIo {
    fn open(&self, path: &str) -> Result<Arc<dyn RasterDataset>> {
        self.counters.opens.fetch_add(1, Ordering::Relaxed);
        let datasets = self.datasets.read().unwrap_or_else(|e| e.into_inner());
        match datasets.get(path) {
            Some(dataset) => Ok(Arc::clone(dataset) as Arc<dyn RasterDataset>),
            None => Err(IoError::NotFound(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> (RasterInfo, Vec<f32>) {
        let info = RasterInfo::north_up(0.0, 4.0, 1.0, 4, 4);
        let data = (0..16).map(|v| v as f32).collect();
        (info, data)
    }

    #[test]
    fn test_open_and_read() {
        let io = MemoryRasterIo::new();
        let (info, data) = ramp();
        io.insert("/a", info, data).unwrap();

        let ds = io.open("/a").unwrap();
        assert_eq!(ds.read_pixel(1, 2).unwrap(), 6.0);
        assert_eq!(ds.read_window(2, 1, 2, 2).unwrap(), vec![9.0, 10.0, 13.0, 14.0]);
        assert_eq!(io.stats(), IoStats { opens: 1, reads: 2 });
    }

    #[test]
    fn test_missing_path_counts_open() {
        let io = MemoryRasterIo::new();
        let err = io.open("/missing").err().unwrap();
        assert!(err.is_not_found());
        assert_eq!(io.stats().opens, 1);
    }

    #[test]
    fn test_insert_rejects_wrong_length() {
        let io = MemoryRasterIo::new();
        let (info, _) = ramp();
        assert!(io.insert("/bad", info, vec![0.0; 3]).is_err());
        assert!(!io.contains("/bad"));
    }

    #[test]
    fn test_out_of_range_window_is_not_counted() {
        let io = MemoryRasterIo::new();
        let (info, data) = ramp();
        io.insert("/a", info, data).unwrap();
        let ds = io.open("/a").unwrap();
        assert!(ds.read_window(3, 3, 2, 2).is_err());
        assert_eq!(io.stats().reads, 0);
    }
}
