//! Offline per-platform game catalogs
//!
//! Catalog files are TOML documents with one `[[game]]` table per record:
//!
//! ```toml
//! [[game]]
//! key = "Super Mario World (USA)"
//! title = "Super Mario World"
//! year = "1990"
//! genre = "Platform"
//! ```
//!
//! [`CatalogCache`] keeps the catalog of one platform at a time. Platforms
//! that are not registered, or whose file cannot be read, get an empty
//! catalog so lookups simply find nothing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// How records of a platform are matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    /// Records keyed by ROM set name (arcade)
    ExactKey,
    /// Records keyed by release name, matched by name
    General,
    /// Null catalog with no records
    Unknown,
}

/// Registry entry for one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub name: String,
    /// Catalog file name relative to the catalog root
    pub file_name: String,
    pub kind: CatalogKind,
    /// Platform whose catalog this one reuses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
}

impl PlatformInfo {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>, kind: CatalogKind) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            kind,
            alias_of: None,
        }
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: String::new(),
            kind: CatalogKind::Unknown,
            alias_of: Some(target.into()),
        }
    }
}

const BUILTIN_PLATFORMS: &[(&str, &str, CatalogKind)] = &[
    ("MAME", "MAME.toml", CatalogKind::ExactKey),
    ("Atari 2600", "Atari 2600.toml", CatalogKind::General),
    ("Nintendo NES", "Nintendo NES.toml", CatalogKind::General),
    ("Nintendo SNES", "Nintendo SNES.toml", CatalogKind::General),
    ("Nintendo N64", "Nintendo N64.toml", CatalogKind::General),
    ("Nintendo GameCube", "Nintendo GameCube.toml", CatalogKind::General),
    ("Nintendo GameBoy", "Nintendo GameBoy.toml", CatalogKind::General),
    ("Sega Master System", "Sega Master System.toml", CatalogKind::General),
    ("Sega Genesis", "Sega Genesis.toml", CatalogKind::General),
    ("Sega Saturn", "Sega Saturn.toml", CatalogKind::General),
    ("Sony PlayStation", "Sony PlayStation.toml", CatalogKind::General),
];

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("FinalBurn Neo", "MAME"),
    ("Sega Mega Drive", "Sega Genesis"),
    ("Sony PSX", "Sony PlayStation"),
];

/// Table of platforms that have an offline catalog
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: Vec<PlatformInfo>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlatformRegistry {
    pub fn new(platforms: Vec<PlatformInfo>) -> Self {
        Self { platforms }
    }

    /// Registry of the platforms shipped with the addon
    pub fn builtin() -> Self {
        let mut platforms: Vec<PlatformInfo> = BUILTIN_PLATFORMS
            .iter()
            .map(|(name, file, kind)| PlatformInfo::new(*name, *file, *kind))
            .collect();
        platforms.extend(
            BUILTIN_ALIASES
                .iter()
                .map(|(name, target)| PlatformInfo::alias(*name, *target)),
        );
        Self { platforms }
    }

    pub fn platforms(&self) -> &[PlatformInfo] {
        &self.platforms
    }

    /// Look up a platform by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&PlatformInfo> {
        self.platforms.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Look up a platform and follow its alias chain to the platform owning the file
    pub fn resolve(&self, name: &str) -> Option<&PlatformInfo> {
        let mut current = self.get(name)?;
        let mut hops = 0;
        while let Some(target) = &current.alias_of {
            hops += 1;
            if hops > self.platforms.len() {
                log::warn!("Alias cycle while resolving platform {}", name);
                return None;
            }
            current = self.get(target)?;
        }
        Some(current)
    }
}

/// One game in a catalog file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRecord {
    pub key: String,
    pub title: String,
    pub year: String,
    pub genre: String,
    pub developer: String,
    pub nplayers: String,
    pub rating: String,
    pub plot: String,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    game: Vec<CatalogRecord>,
}

/// Records of one platform in file order
#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    platform: String,
    kind: CatalogKind,
    records: Vec<CatalogRecord>,
    index: HashMap<String, usize>,
}

impl PlatformCatalog {
    /// The empty catalog used when no platform data is available
    pub fn unknown() -> Self {
        Self {
            platform: "Unknown".to_string(),
            kind: CatalogKind::Unknown,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a catalog from records; later duplicates of a key are dropped
    pub fn from_records(platform: impl Into<String>, kind: CatalogKind, records: Vec<CatalogRecord>) -> Self {
        let platform = platform.into();
        let mut index = HashMap::with_capacity(records.len());
        let mut unique = Vec::with_capacity(records.len());

        for record in records {
            if record.key.is_empty() {
                log::warn!("Catalog {} has a record without key, skipping it", platform);
                continue;
            }
            let lookup = Self::lookup_key(kind, &record.key);
            if index.contains_key(&lookup) {
                log::warn!("Catalog {} repeats key {:?}, keeping the first", platform, record.key);
                continue;
            }
            index.insert(lookup, unique.len());
            unique.push(record);
        }

        Self {
            platform,
            kind,
            records: unique,
            index,
        }
    }

    /// Parse catalog file content
    pub fn parse(platform: &str, kind: CatalogKind, content: &str) -> Result<Self, ScanError> {
        let file: CatalogFile = toml::from_str(content)?;
        Ok(Self::from_records(platform, kind, file.game))
    }

    /// Read and parse a catalog file
    pub fn load(platform: &str, kind: CatalogKind, path: &Path) -> Result<Self, ScanError> {
        let content = fs::read_to_string(path).map_err(|e| ScanError::from(e).with_path(path))?;
        Self::parse(platform, kind, &content).map_err(|e| ScanError::catalog(path.to_path_buf(), e.message))
    }

    fn lookup_key(kind: CatalogKind, key: &str) -> String {
        match kind {
            CatalogKind::ExactKey => key.to_lowercase(),
            _ => key.to_string(),
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find a record by key (ignoring case for exact-key catalogs)
    pub fn get(&self, key: &str) -> Option<&CatalogRecord> {
        self.index
            .get(&Self::lookup_key(self.kind, key))
            .map(|&i| &self.records[i])
    }
}

/// What the cache currently holds
#[derive(Debug, Clone)]
pub enum CacheState {
    /// Nothing usable is loaded
    Unknown,
    /// The catalog of `platform`
    Loaded { platform: String, catalog: PlatformCatalog },
}

/// Single-slot cache of platform catalogs
pub struct CatalogCache {
    root: PathBuf,
    registry: PlatformRegistry,
    state: CacheState,
    unknown: PlatformCatalog,
}

impl CatalogCache {
    pub fn new(root: impl Into<PathBuf>, registry: PlatformRegistry) -> Self {
        Self {
            root: root.into(),
            registry,
            state: CacheState::Unknown,
            unknown: PlatformCatalog::unknown(),
        }
    }

    /// Cache over the built-in platform registry
    pub fn with_builtin(root: impl Into<PathBuf>) -> Self {
        Self::new(root, PlatformRegistry::builtin())
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// Catalog currently held
    pub fn current(&self) -> &PlatformCatalog {
        match &self.state {
            CacheState::Loaded { catalog, .. } => catalog,
            CacheState::Unknown => &self.unknown,
        }
    }

    /// Make sure the catalog of `platform` is cached and return it
    pub fn load(&mut self, platform: &str) -> &PlatformCatalog {
        let cached = matches!(
            &self.state,
            CacheState::Loaded { platform: p, .. } if p.eq_ignore_ascii_case(platform)
        );
        if !cached {
            self.state = self.read_state(platform);
        }
        self.current()
    }

    fn read_state(&self, platform: &str) -> CacheState {
        let Some(info) = self.registry.resolve(platform) else {
            log::warn!("No offline catalog registered for platform {}", platform);
            return CacheState::Unknown;
        };
        if info.kind == CatalogKind::Unknown {
            log::warn!("Platform {} has no usable catalog kind", info.name);
            return CacheState::Unknown;
        }

        let path = self.root.join(&info.file_name);
        match PlatformCatalog::load(platform, info.kind, &path) {
            Ok(catalog) => {
                log::info!(
                    "Loaded offline catalog for {} from {:?} ({} records)",
                    platform,
                    path,
                    catalog.len()
                );
                CacheState::Loaded {
                    platform: platform.to_string(),
                    catalog,
                }
            }
            Err(e) => {
                log::warn!("Could not load offline catalog for {}: {}", platform, e);
                CacheState::Unknown
            }
        }
    }
}
