//! Contracts of the external inventory service and the filesystem probe

use std::path::Path;

use crate::error::ScanError;
use crate::models::{InventoryEntry, NewItem};

/// Remote inventory of known ROMs, partitioned by scanner id
pub trait InventoryService {
    /// Fetch the entries visible to `scanner_id`
    fn fetch_inventory(&self, scanner_id: &str) -> Result<Vec<InventoryEntry>, ScanError>;

    /// Create entries for newly discovered files
    fn create_entries(&mut self, scanner_id: &str, items: &[NewItem]) -> Result<(), ScanError>;

    /// Delete entries by id
    fn delete_entries(&mut self, ids: &[String]) -> Result<(), ScanError>;
}

impl<T: InventoryService + ?Sized> InventoryService for &mut T {
    fn fetch_inventory(&self, scanner_id: &str) -> Result<Vec<InventoryEntry>, ScanError> {
        (**self).fetch_inventory(scanner_id)
    }

    fn create_entries(&mut self, scanner_id: &str, items: &[NewItem]) -> Result<(), ScanError> {
        (**self).create_entries(scanner_id, items)
    }

    fn delete_entries(&mut self, ids: &[String]) -> Result<(), ScanError> {
        (**self).delete_entries(ids)
    }
}

/// Direct existence check used to confirm dead entries
pub trait FileProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the local filesystem
///
/// A path that cannot be checked counts as missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileProbe;

impl FileProbe for LocalFileProbe {
    fn exists(&self, path: &Path) -> bool {
        match path.try_exists() {
            Ok(exists) => exists,
            Err(e) => {
                log::warn!("Could not check {:?}, treating it as missing: {}", path, e);
                false
            }
        }
    }
}

impl<F: Fn(&Path) -> bool> FileProbe for F {
    fn exists(&self, path: &Path) -> bool {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_probe() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tetris.zip");
        std::fs::write(&file, b"rom").unwrap();

        assert!(LocalFileProbe.exists(&file));
        assert!(!LocalFileProbe.exists(&dir.path().join("gone.zip")));
    }

    #[cfg(unix)]
    #[test]
    fn test_local_probe_treats_check_errors_as_missing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tetris.zip");
        std::fs::write(&file, b"rom").unwrap();

        // a regular file used as a directory fails with ENOTDIR, not NotFound
        let below_file = file.join("inner.zip");
        assert!(below_file.try_exists().is_err());
        assert!(!LocalFileProbe.exists(&below_file));
    }

    #[test]
    fn test_closure_probe() {
        let probe = |p: &Path| p.starts_with("/fake");
        assert!(probe.exists(Path::new("/fake/folder/rocket.zip")));
        assert!(!probe.exists(Path::new("/not-existing/byebye.zip")));
    }
}
