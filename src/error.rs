//! Error types for the ROM scanner

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while scanning, committing or matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// Database operation failed
    DatabaseError,
    /// The inventory service rejected a fetch, create or delete request
    Inventory,
    /// Settings document or CLI configuration is invalid
    Config,
    /// Catalog file could not be parsed
    Catalog,
    /// Operation called out of order (e.g. committing before a scan)
    InvalidState,
    /// Unknown error
    Unknown,
}

/// Represents an error that occurred during scanning
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::PermissionDenied,
            Some(path.clone()),
            format!("Permission denied: {:?}", path),
        )
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, path, message)
    }

    /// Create a database error
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::DatabaseError, None, message)
    }

    /// Create an inventory service error
    pub fn inventory(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Inventory, None, message)
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Config, None, message)
    }

    /// Create a catalog parse error
    pub fn catalog(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Catalog, Some(path), message)
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InvalidState, None, message)
    }

    /// Attach the path the error refers to
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<walkdir::Error> for ScanError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let kind = match err.io_error().map(|e| e.kind()) {
            Some(std::io::ErrorKind::PermissionDenied) => ScanErrorKind::PermissionDenied,
            Some(std::io::ErrorKind::NotFound) => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, path, err.to_string())
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        Self::database_error(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ScanErrorKind::Catalog, None, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kind_mapping() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(ScanError::from(denied).kind, ScanErrorKind::PermissionDenied);

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ScanError::from(missing).kind, ScanErrorKind::NotFound);

        let other = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(ScanError::from(other).kind, ScanErrorKind::IoError);
    }

    #[test]
    fn test_display_includes_kind_and_path() {
        let err = ScanError::not_found(PathBuf::from("/roms/snes"));
        let text = err.to_string();
        assert!(text.starts_with("NotFound"));
        assert!(text.contains("/roms/snes"));
    }

    #[test]
    fn test_with_path() {
        let err = ScanError::inventory("create failed").with_path("/roms/a.zip");
        assert_eq!(err.kind, ScanErrorKind::Inventory);
        assert_eq!(err.path, Some(PathBuf::from("/roms/a.zip")));
    }
}
