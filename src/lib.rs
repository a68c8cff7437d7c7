//! ROM folder scanning, inventory reconciliation and offline catalog matching
//!
//! [`RomFolderScanner`] walks ROM folders and sorts the files into new,
//! existing and dead inventory entries. [`OfflineScraper`] resolves files
//! to games in bundled per-platform catalogs.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod inventory;
pub mod local;
pub mod matcher;
pub mod models;
pub mod progress;
pub mod reconciler;
pub mod report;
pub mod scanner;

pub use catalog::{CacheState, CatalogCache, CatalogKind, PlatformCatalog, PlatformInfo, PlatformRegistry};
pub use config::{ScanConfig, ScannerSettings};
pub use db::SqliteInventory;
pub use error::{ScanError, ScanErrorKind};
pub use inventory::{FileProbe, InventoryService, LocalFileProbe};
pub use local::{find_local_asset, metadata_from_nfo};
pub use matcher::OfflineScraper;
pub use models::{
    CandidateMatch, DiscInfo, GameMetadata, InventoryEntry, MultiDiscSet, NewItem, Outcome,
    ReconciliationResult, ScanSummary, ScannedItem,
};
pub use progress::{CancelFlag, JsonProgress, NoProgress, ProgressPort};
pub use reconciler::RomFolderScanner;
pub use scanner::walk;
