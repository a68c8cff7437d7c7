//! Inventory reconciliation
//!
//! [`RomFolderScanner`] walks the configured folders, compares the files
//! with the entries the inventory service already knows for the scanner,
//! and keeps the new and dead partitions until they are committed.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::inventory::{FileProbe, InventoryService, LocalFileProbe};
use crate::models::{InventoryEntry, NewItem, Outcome, ReconciliationResult, ScanSummary, ScannedItem};
use crate::progress::{percentage, ProgressPort};
use crate::report::ScanReport;
use crate::scanner::walk;

/// Classify scanned files and prior entries into new, kept and dead
///
/// Entries not owned by `scanner_id` can be kept but are never dead. An
/// owned entry that was not found again is dead only if `probe` confirms
/// its file is gone.
pub fn reconcile(
    items: &[ScannedItem],
    entries: &[InventoryEntry],
    scanner_id: &str,
    probe: &dyn FileProbe,
    progress: &mut dyn ProgressPort,
) -> Outcome<ReconciliationResult> {
    let mut recorded: HashMap<&Path, Vec<usize>> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        if let Some(file) = &entry.file {
            recorded.entry(file.as_path()).or_default().push(index);
        }
    }

    let mut result = ReconciliationResult::default();
    let mut kept = vec![false; entries.len()];

    for item in items {
        match recorded.get(item.path.as_path()) {
            Some(indices) => indices.iter().for_each(|&i| kept[i] = true),
            None => result.new_items.push(item.clone()),
        }
    }

    for (index, entry) in entries.iter().enumerate() {
        if progress.is_cancelled() {
            return Outcome::Cancelled;
        }
        progress.set_percentage(percentage(index, entries.len()));

        if kept[index] {
            result.kept_ids.push(entry.id.clone());
            continue;
        }
        if !entry.is_owned_by(scanner_id) {
            continue;
        }
        let Some(file) = &entry.file else {
            log::debug!("Entry {} has no recorded file, leaving it alone", entry.id);
            continue;
        };
        if !probe.exists(file) {
            log::debug!("Entry {} is dead, {:?} is gone", entry.id, file);
            result.dead_ids.push(entry.id.clone());
        }
    }

    Outcome::Completed(result)
}

/// Derive a fresh inventory id for a scanned file
pub fn generate_id(scanner_id: &str, item: &ScannedItem, scanned_at: &DateTime<Utc>) -> String {
    let mut hasher = Md5::new();
    hasher.update(scanner_id.as_bytes());
    hasher.update(item.path.to_string_lossy().as_bytes());
    hasher.update(scanned_at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(item.order.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Everything one completed scan produced
struct ScanPass {
    result: ReconciliationResult,
    pending: Vec<NewItem>,
    summary: ScanSummary,
    stored: bool,
    removed: bool,
}

/// Scans ROM folders for one scanner and commits the outcome to the inventory
pub struct RomFolderScanner<I, P = LocalFileProbe> {
    scanner_id: String,
    config: ScanConfig,
    inventory: I,
    probe: P,
    pass: Option<ScanPass>,
}

impl<I: InventoryService> RomFolderScanner<I, LocalFileProbe> {
    /// Create a scanner that checks files on the local filesystem
    pub fn new(scanner_id: impl Into<String>, config: ScanConfig, inventory: I) -> Self {
        Self {
            scanner_id: scanner_id.into(),
            config,
            inventory,
            probe: LocalFileProbe,
            pass: None,
        }
    }
}

impl<I: InventoryService, P: FileProbe> RomFolderScanner<I, P> {
    /// Replace the existence probe
    pub fn with_probe<Q: FileProbe>(self, probe: Q) -> RomFolderScanner<I, Q> {
        RomFolderScanner {
            scanner_id: self.scanner_id,
            config: self.config,
            inventory: self.inventory,
            probe,
            pass: None,
        }
    }

    pub fn scanner_id(&self) -> &str {
        &self.scanner_id
    }

    /// Walk the folders and reconcile them with the inventory
    ///
    /// Replaces the outcome of any earlier pass. Cancellation discards
    /// everything found so far.
    pub fn scan(&mut self, progress: &mut dyn ProgressPort) -> Result<Outcome<&ScanSummary>, ScanError> {
        let start = Instant::now();
        self.pass = None;

        log::info!("Scanner {}: fetching inventory", self.scanner_id);
        progress.set_message("Loading inventory");
        let entries = self.inventory.fetch_inventory(&self.scanner_id).map_err(|e| {
            ScanError::inventory(format!("Could not fetch inventory: {}", e.message))
        })?;
        log::info!("Scanner {}: {} known entries", self.scanner_id, entries.len());

        let walked = match walk(&self.config, progress) {
            Outcome::Completed(walked) => walked,
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        };

        progress.set_message("Checking for dead ROMs");
        let result = match reconcile(
            &walked.items,
            &entries,
            &self.scanner_id,
            &self.probe,
            progress,
        ) {
            Outcome::Completed(result) => result,
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        };

        let scanned_at = Utc::now();
        let pending = result
            .new_items
            .iter()
            .map(|item| NewItem {
                id: generate_id(&self.scanner_id, item, &scanned_at),
                scanner_id: self.scanner_id.clone(),
                file: item.path.clone(),
                name: item.display_name().to_string(),
                disc: item.disc,
                multidisc: item.multidisc.clone(),
            })
            .collect();

        let total = walked.items.len() as u64;
        let summary = ScanSummary {
            total_files: total,
            total_dirs: walked.total_dirs,
            excluded_files: walked.excluded_files,
            new_files: result.new_items.len() as u64,
            existing_files: total - result.new_items.len() as u64,
            dead_files: result.dead_ids.len() as u64,
            errors: walked.errors,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        log::info!(
            "Scanner {}: {} files, {} new, {} dead",
            self.scanner_id,
            summary.total_files,
            summary.new_files,
            summary.dead_files
        );

        if let Some(report_path) = &self.config.report_path {
            let report = ScanReport {
                scanner_id: &self.scanner_id,
                config: &self.config,
                summary: &summary,
                result: &result,
                generated_at: scanned_at,
            };
            match report.write_to(report_path) {
                Ok(path) => log::info!("Scan report written to {:?}", path),
                Err(e) => log::warn!("Could not write scan report to {:?}: {}", report_path, e),
            }
        }

        progress.set_percentage(100);
        progress.set_message("Scan done");

        let pass = self.pass.insert(ScanPass {
            result,
            pending,
            summary,
            stored: false,
            removed: false,
        });
        Ok(Outcome::Completed(&pass.summary))
    }

    /// Number of newly discovered files in the last pass
    pub fn amount_of_scanned_roms(&self) -> usize {
        self.pass.as_ref().map_or(0, |p| p.result.new_items.len())
    }

    /// Number of dead entries in the last pass
    pub fn amount_of_dead_roms(&self) -> usize {
        self.pass.as_ref().map_or(0, |p| p.result.dead_ids.len())
    }

    /// Newly discovered files in the last pass
    pub fn scanned_roms(&self) -> &[ScannedItem] {
        self.pass.as_ref().map_or(&[], |p| &p.result.new_items)
    }

    /// Create requests prepared for the new files
    pub fn pending_items(&self) -> &[NewItem] {
        self.pass.as_ref().map_or(&[], |p| &p.pending)
    }

    /// Ids of the dead entries in the last pass
    pub fn dead_rom_ids(&self) -> &[String] {
        self.pass.as_ref().map_or(&[], |p| &p.result.dead_ids)
    }

    pub fn result(&self) -> Option<&ReconciliationResult> {
        self.pass.as_ref().map(|p| &p.result)
    }

    pub fn summary(&self) -> Option<&ScanSummary> {
        self.pass.as_ref().map(|p| &p.summary)
    }

    /// Ask the inventory to delete the dead entries
    ///
    /// Returns how many entries were deleted. On failure the dead set is
    /// kept so the call can be retried.
    pub fn remove_dead_roms(&mut self) -> Result<usize, ScanError> {
        let pass = self
            .pass
            .as_mut()
            .ok_or_else(|| ScanError::invalid_state("remove_dead_roms called before scan"))?;

        if pass.removed {
            log::info!("Dead ROMs of scanner {} already removed", self.scanner_id);
            return Ok(0);
        }
        if !pass.result.dead_ids.is_empty() {
            self.inventory
                .delete_entries(&pass.result.dead_ids)
                .map_err(|e| {
                    log::error!("Removing dead ROMs failed: {}", e);
                    ScanError::inventory(format!("Could not delete dead entries: {}", e.message))
                })?;
        }
        pass.removed = true;
        log::info!("Removed {} dead ROMs", pass.result.dead_ids.len());
        Ok(pass.result.dead_ids.len())
    }

    /// Ask the inventory to create entries for the new files
    ///
    /// Each request carries the disc tags of its file. Returns how many
    /// entries were created. On failure the new set is kept so the call can
    /// be retried with the same ids.
    pub fn store_scanned_roms(&mut self) -> Result<usize, ScanError> {
        let pass = self
            .pass
            .as_mut()
            .ok_or_else(|| ScanError::invalid_state("store_scanned_roms called before scan"))?;

        if pass.stored {
            log::info!("Scanned ROMs of scanner {} already stored", self.scanner_id);
            return Ok(0);
        }
        if !pass.pending.is_empty() {
            self.inventory
                .create_entries(&self.scanner_id, &pass.pending)
                .map_err(|e| {
                    log::error!("Storing scanned ROMs failed: {}", e);
                    ScanError::inventory(format!("Could not create entries: {}", e.message))
                })?;
        }
        pass.stored = true;
        log::info!("Stored {} scanned ROMs", pass.pending.len());
        Ok(pass.pending.len())
    }

    /// Store new files and remove dead entries in one go
    ///
    /// Removal is attempted even when storing fails, so each half reports
    /// its own outcome and a failed half can be retried on its own.
    pub fn commit(&mut self) -> (Result<usize, ScanError>, Result<usize, ScanError>) {
        let stored = self.store_scanned_roms();
        let removed = self.remove_dead_roms();
        (stored, removed)
    }

    /// Give the inventory back
    pub fn into_inventory(self) -> I {
        self.inventory
    }
}
