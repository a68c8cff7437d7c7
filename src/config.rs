//! Configuration for the ROM scanner

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Default max depth for recursive scanning
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Default BIOS marker token
pub const DEFAULT_BIOS_MARKER: &str = "[BIOS]";

/// Configuration for the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Root directories to scan
    pub roots: Vec<PathBuf>,

    /// File extensions to include (lowercase, without dot)
    /// If empty, every file is included
    pub extensions: HashSet<String>,

    /// Directory names to ignore
    pub ignore_dirs: HashSet<String>,

    /// Whether to scan subdirectories recursively
    /// If false, only scan files in the root directories
    pub recursive: bool,

    /// Maximum depth for recursive scanning
    pub max_depth: usize,

    /// Whether `<title> (Disc n of m)` files are tagged as multi-disc sets
    pub multidisc: bool,

    /// Base names starting with this token are never scanned
    pub bios_marker: String,

    /// Where to write the plain text scan report
    pub report_path: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: Self::default_extensions(),
            ignore_dirs: Self::default_ignore_dirs(),
            recursive: true,
            max_depth: DEFAULT_MAX_DEPTH,
            multidisc: false,
            bios_marker: DEFAULT_BIOS_MARKER.to_string(),
            report_path: None,
        }
    }
}

impl ScanConfig {
    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Get the default ROM and disc image extensions
    pub fn default_extensions() -> HashSet<String> {
        [
            "zip", "7z", "nes", "fds", "sfc", "smc", "gb", "gbc", "gba", "n64", "z64", "v64",
            "nds", "md", "gen", "sms", "gg", "32x", "pce", "a26", "lnx", "iso", "cue", "chd",
            "pbp", "cso",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Get the default directories to ignore
    pub fn default_ignore_dirs() -> HashSet<String> {
        [
            "$RECYCLE.BIN",
            "System Volume Information",
            ".Trash",
            ".Trash-1000",
            "@eaDir",
            ".git",
            ".svn",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Parse an extension list such as `"zip|7z"` or `".nes, .fds"`
    pub fn parse_extensions(list: &str) -> HashSet<String> {
        list.split(['|', ',', ';', ' '])
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Check if an extension should be included
    pub fn should_include_extension(&self, ext: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        self.extensions.contains(&ext.to_lowercase())
    }

    /// Check if a directory should be ignored
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return true;
        }
        self.ignore_dirs.contains(name)
    }

    /// Check if a base name carries the BIOS marker
    pub fn is_bios(&self, base_name: &str) -> bool {
        !self.bios_marker.is_empty() && base_name.trim_start().starts_with(&self.bios_marker)
    }

    /// Get the effective max depth for walkdir
    pub fn effective_max_depth(&self) -> usize {
        if !self.recursive {
            1
        } else {
            self.max_depth
        }
    }

    /// Build a config from the addon's scanner settings document
    pub fn from_settings(settings: &ScannerSettings) -> Self {
        let mut builder = ScanConfig::builder()
            .recursive(settings.scan_recursive)
            .multidisc(settings.multidisc);

        if let Some(rompath) = &settings.rompath {
            builder = builder.add_root(rompath.clone());
        }
        let extensions = ScanConfig::parse_extensions(&settings.romext);
        if !extensions.is_empty() {
            builder = builder.extensions(extensions);
        }
        for dir in &settings.excluded {
            builder = builder.add_ignore_dir(dir.clone());
        }
        builder.build()
    }
}

/// Scanner settings as stored by the host addon
///
/// ```json
/// { "rompath": "/roms/snes", "romext": "zip|sfc", "multidisc": false, "scan_recursive": true }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Root folder holding the ROMs
    #[serde(default)]
    pub rompath: Option<PathBuf>,
    /// Accepted extensions separated by `|`
    #[serde(default)]
    pub romext: String,
    #[serde(default)]
    pub multidisc: bool,
    #[serde(default = "default_true")]
    pub scan_recursive: bool,
    /// Directory names to skip
    #[serde(default)]
    pub excluded: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ScannerSettings {
    /// Parse a settings document
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a settings document from disk
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ScanError::from(e).with_path(path))?;
        Self::from_json(&contents).map_err(|e| e.with_path(path))
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root directory
    pub fn add_root(mut self, root: PathBuf) -> Self {
        self.config.roots.push(root);
        self
    }

    /// Set the extensions whitelist
    pub fn extensions(mut self, extensions: HashSet<String>) -> Self {
        self.config.extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Add a directory to ignore
    pub fn add_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.ignore_dirs.insert(dir.into());
        self
    }

    /// Enable or disable recursive scanning
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.config.recursive = enabled;
        self
    }

    /// Set the maximum depth for recursive scanning
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Enable or disable multi-disc tagging
    pub fn multidisc(mut self, enabled: bool) -> Self {
        self.config.multidisc = enabled;
        self
    }

    /// Set the BIOS marker token
    pub fn bios_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.bios_marker = marker.into();
        self
    }

    /// Set the report path
    pub fn report_path(mut self, path: PathBuf) -> Self {
        self.config.report_path = Some(path);
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}
