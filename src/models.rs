//! Core data models for the ROM scanner

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ScanError;

/// Result of an operation that honours cooperative cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation ran to the end
    Completed(T),
    /// The caller cancelled; partial results were discarded
    Cancelled,
}

impl<T> Outcome<T> {
    /// Check whether the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Get the completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }
}

/// Position of one disc inside a multi-disc title
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiscInfo {
    /// 1-based disc number
    pub index: u32,
    /// Number of discs the title claims to have
    pub total: u32,
}

impl std::fmt::Display for DiscInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Disc {} of {}", self.index, self.total)
    }
}

/// Discs found on disk for one title and extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiDiscSet {
    /// Title shared by every disc
    pub title: String,
    /// Discs present in the scan, ordered by index
    pub discs: Vec<DiscInfo>,
}

impl MultiDiscSet {
    /// Check whether every disc from 1 to `total` was found
    pub fn is_complete(&self) -> bool {
        let Some(total) = self.discs.iter().map(|d| d.total).max() else {
            return false;
        };
        (1..=total).all(|i| self.discs.iter().any(|d| d.index == i))
    }
}

/// A qualifying file found by the folder walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedItem {
    /// Full path to the file
    pub path: PathBuf,
    /// File name without directory and extension
    pub base_name: String,
    /// File extension (lowercase, without dot)
    pub extension: String,
    /// Disc position when the name follows the multi-disc pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc: Option<DiscInfo>,
    /// The multi-disc set this file belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multidisc: Option<MultiDiscSet>,
    /// Discovery order within the walk
    pub order: usize,
}

impl ScannedItem {
    /// Create a standalone item
    pub fn new(path: PathBuf, base_name: String, extension: String, order: usize) -> Self {
        Self {
            path,
            base_name,
            extension,
            disc: None,
            multidisc: None,
            order,
        }
    }

    /// Name to store in the inventory: the set title for discs, else the base name
    pub fn display_name(&self) -> &str {
        match &self.multidisc {
            Some(set) => &set.title,
            None => &self.base_name,
        }
    }
}

/// A record owned by the external inventory service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub id: String,
    /// Scanner that created the entry, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner_id: Option<String>,
    /// Source file recorded at scan time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub name: String,
    /// Whatever else the service stores for the entry
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl InventoryEntry {
    /// Create an entry recorded by a scanner
    pub fn scanned(
        id: impl Into<String>,
        scanner_id: impl Into<String>,
        file: impl Into<PathBuf>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            scanner_id: Some(scanner_id.into()),
            file: Some(file.into()),
            name: name.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Check whether the given scanner created this entry
    pub fn is_owned_by(&self, scanner_id: &str) -> bool {
        self.scanner_id.as_deref() == Some(scanner_id)
    }
}

/// Create request for a newly discovered file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub id: String,
    pub scanner_id: String,
    pub file: PathBuf,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc: Option<DiscInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multidisc: Option<MultiDiscSet>,
}

/// Partitions computed by one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Discovered files with no matching inventory entry
    pub new_items: Vec<ScannedItem>,
    /// Entries whose recorded file was discovered again
    pub kept_ids: Vec<String>,
    /// Entries of this scanner whose file is gone
    pub dead_ids: Vec<String>,
}

/// Summary of a scan pass
#[derive(Debug, Default, Serialize)]
pub struct ScanSummary {
    /// Qualifying files found by the walk
    pub total_files: u64,
    /// Total number of directories traversed
    pub total_dirs: u64,
    /// Files dropped because of the BIOS marker
    pub excluded_files: u64,
    /// Files not yet in the inventory
    pub new_files: u64,
    /// Files already in the inventory
    pub existing_files: u64,
    /// Inventory entries whose file is gone
    pub dead_files: u64,
    /// Errors encountered during scanning
    #[serde(skip)]
    pub errors: Vec<ScanError>,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
}

impl ScanSummary {
    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the scan completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A catalog record proposed for a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMatch {
    /// Catalog key used to fetch metadata
    pub key: String,
    pub display_name: String,
    /// Platform the request was made for
    pub platform: String,
    /// Rank weight, higher is better
    pub weight: u32,
}

/// Metadata fields resolved for a game
///
/// Every field is empty when unknown; the default value is the null record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub title: String,
    pub year: String,
    pub genre: String,
    pub developer: String,
    pub nplayers: String,
    pub rating: String,
    pub plot: String,
}

impl GameMetadata {
    /// Check whether no field is set
    pub fn is_empty(&self) -> bool {
        *self == GameMetadata::default()
    }
}
