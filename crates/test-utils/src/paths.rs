//! Path utilities for test catalogs.
//!
//! Layout under a catalog root:
//!
//! ```text
//! <root>/<marker>/geocells/<tile>.geojson
//! <root>/<marker>/strips/<id><suffix>
//! ```

use std::path::{Path, PathBuf};

/// Directory holding a provider's geocell index files.
pub fn geocell_dir(root: &Path, marker: &str) -> PathBuf {
    root.join(marker).join("geocells")
}

/// Local path a strip reference resolves to, e.g. `<root>/arcticdem/strips/s1_dem.tif`.
pub fn strip_path(root: &Path, marker: &str, id: &str, suffix: &str) -> PathBuf {
    root.join(marker).join("strips").join(format!("{}{}", id, suffix))
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("catalog_test_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let root = Path::new("/data/pgc");
        assert_eq!(
            geocell_dir(root, "arcticdem"),
            PathBuf::from("/data/pgc/arcticdem/geocells")
        );
        assert_eq!(
            strip_path(root, "rema", "s1", "_bitmask.tif"),
            PathBuf::from("/data/pgc/rema/strips/s1_bitmask.tif")
        );
    }

    #[test]
    fn test_temp_test_dir() {
        let dir = temp_test_dir();
        assert!(dir.path().exists());
        assert!(dir.path().to_string_lossy().contains("catalog_test_"));
    }
}
