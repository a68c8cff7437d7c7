//! SQLite-backed inventory store

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::inventory::InventoryService;
use crate::models::{DiscInfo, InventoryEntry, MultiDiscSet, NewItem};

/// Inventory of ROM entries stored in a SQLite database
pub struct SqliteInventory {
    conn: Connection,
}

impl SqliteInventory {
    /// Open or create database
    pub fn open(path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS roms (
                id TEXT PRIMARY KEY,
                scanner_id TEXT,
                file TEXT,
                name TEXT NOT NULL,
                disc_index INTEGER,
                disc_total INTEGER,
                multidisc TEXT,
                metadata TEXT,
                scanned_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_roms_scanner ON roms(scanner_id);
            CREATE INDEX IF NOT EXISTS idx_roms_file ON roms(file);
            ",
        )?;
        Ok(())
    }

    fn entry_from_row(row: &Row<'_>) -> SqliteResult<InventoryEntry> {
        let metadata: Option<String> = row.get(4)?;
        Ok(InventoryEntry {
            id: row.get(0)?,
            scanner_id: row.get(1)?,
            file: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
            name: row.get(3)?,
            metadata: metadata
                .and_then(|m| serde_json::from_str(&m).ok())
                .unwrap_or(serde_json::Value::Null),
        })
    }

    /// Load entries owned by `scanner_id` plus entries owned by no scanner
    pub fn load_entries(&self, scanner_id: &str) -> SqliteResult<Vec<InventoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, scanner_id, file, name, metadata FROM roms
             WHERE scanner_id = ?1 OR scanner_id IS NULL
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([scanner_id], Self::entry_from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Load every entry
    pub fn load_all(&self) -> SqliteResult<Vec<InventoryEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, scanner_id, file, name, metadata FROM roms ORDER BY rowid")?;
        let rows = stmt.query_map([], Self::entry_from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Insert or replace an existing entry (seeding, imports)
    pub fn insert_entry(&mut self, entry: &InventoryEntry) -> SqliteResult<()> {
        let metadata = if entry.metadata.is_null() {
            None
        } else {
            Some(entry.metadata.to_string())
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO roms (id, scanner_id, file, name, metadata, scanned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.scanner_id,
                entry.file.as_ref().map(|f| f.to_string_lossy().to_string()),
                entry.name,
                metadata,
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Batch insert new items
    pub fn insert_new_items(&mut self, scanner_id: &str, items: &[NewItem]) -> SqliteResult<()> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO roms
                 (id, scanner_id, file, name, disc_index, disc_total, multidisc, scanned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for item in items {
                let multidisc = item
                    .multidisc
                    .as_ref()
                    .and_then(|set| serde_json::to_string(set).ok());
                stmt.execute(params![
                    item.id,
                    scanner_id,
                    item.file.to_string_lossy().to_string(),
                    item.name,
                    item.disc.map(|d| d.index),
                    item.disc.map(|d| d.total),
                    multidisc,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete entries by id
    pub fn delete_ids(&mut self, ids: &[String]) -> SqliteResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM roms WHERE id = ?1")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Get the disc tags stored for an entry
    pub fn disc_tags(&self, id: &str) -> SqliteResult<Option<(Option<DiscInfo>, Option<MultiDiscSet>)>> {
        self.conn
            .query_row(
                "SELECT disc_index, disc_total, multidisc FROM roms WHERE id = ?1",
                [id],
                |row| {
                    let index: Option<u32> = row.get(0)?;
                    let total: Option<u32> = row.get(1)?;
                    let multidisc: Option<String> = row.get(2)?;
                    let disc = index.zip(total).map(|(index, total)| DiscInfo { index, total });
                    let set = multidisc.and_then(|m| serde_json::from_str(&m).ok());
                    Ok((disc, set))
                },
            )
            .optional()
    }

    /// Get entry count
    pub fn entry_count(&self) -> SqliteResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM roms", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl InventoryService for SqliteInventory {
    fn fetch_inventory(&self, scanner_id: &str) -> Result<Vec<InventoryEntry>, ScanError> {
        Ok(self.load_entries(scanner_id)?)
    }

    fn create_entries(&mut self, scanner_id: &str, items: &[NewItem]) -> Result<(), ScanError> {
        Ok(self.insert_new_items(scanner_id, items)?)
    }

    fn delete_entries(&mut self, ids: &[String]) -> Result<(), ScanError> {
        Ok(self.delete_ids(ids)?)
    }
}
