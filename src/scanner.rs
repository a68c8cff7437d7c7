//! Folder walk: finds ROM files under the configured roots
//!
//! Produces [`ScannedItem`]s in a stable order (siblings sorted by file
//! name), drops BIOS files and tags `<title> (Disc n of m)` files with
//! their multi-disc set when enabled.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::models::{DiscInfo, MultiDiscSet, Outcome, ScannedItem};
use crate::progress::{percentage, ProgressPort};

static DISC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<title>.*?)\s*\(\s*disc\s*(?P<index>\d+)\s*of\s*(?P<total>\d+)\s*\)(?:\s*[\(\[][^\)\]]*[\)\]])*\s*$",
    )
    .expect("disc pattern is valid")
});

/// Files and counters produced by a walk
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Qualifying files in discovery order
    pub items: Vec<ScannedItem>,
    /// Total number of directories traversed
    pub total_dirs: u64,
    /// Files dropped because of the BIOS marker
    pub excluded_files: u64,
    /// Non-fatal errors (unreadable directories, missing roots)
    pub errors: Vec<ScanError>,
    /// Walk duration in milliseconds
    pub duration_ms: u64,
}

impl WalkResult {
    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the walk completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

enum FileVerdict {
    Accepted(ScannedItem),
    Bios,
    Skipped,
}

/// Split `<title> (Disc n of m)` into its title and disc position
pub fn parse_disc_name(base_name: &str) -> Option<(String, DiscInfo)> {
    let caps = DISC_PATTERN.captures(base_name)?;
    let title = caps.name("title")?.as_str().trim();
    let index: u32 = caps.name("index")?.as_str().parse().ok()?;
    let total: u32 = caps.name("total")?.as_str().parse().ok()?;

    if title.is_empty() || index == 0 || index > total {
        return None;
    }
    Some((title.to_string(), DiscInfo { index, total }))
}

/// Walk every configured root and collect qualifying files
pub fn walk(config: &ScanConfig, progress: &mut dyn ProgressPort) -> Outcome<WalkResult> {
    let start = Instant::now();
    let mut result = WalkResult::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for (root_index, root) in config.roots.iter().enumerate() {
        progress.set_percentage(percentage(root_index, config.roots.len()));
        progress.set_message(&format!("Scanning {}", root.display()));

        if !root.exists() {
            log::warn!("Scan root {:?} does not exist, skipping", root);
            result.errors.push(ScanError::not_found(root.clone()));
            continue;
        }
        let root = match std::path::absolute(root) {
            Ok(root) => root,
            Err(e) => {
                log::warn!("Cannot make scan root {:?} absolute, skipping: {}", root, e);
                result
                    .errors
                    .push(ScanError::io_error(Some(root.clone()), e.to_string()));
                continue;
            }
        };

        let walker = WalkDir::new(&root)
            .max_depth(config.effective_max_depth())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                e.file_name()
                    .to_str()
                    .map(|name| !config.should_ignore_dir(name))
                    .unwrap_or(true)
            });

        for entry in walker {
            if progress.is_cancelled() {
                log::info!("Folder walk cancelled in {:?}", root);
                return Outcome::Cancelled;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    result.errors.push(ScanError::from(e));
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                result.total_dirs += 1;
                progress.set_message(&entry.path().to_string_lossy());
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if seen.contains(entry.path()) {
                log::debug!("Already found {:?} under another root", entry.path());
                continue;
            }

            match process_file(entry.path(), config, result.items.len()) {
                FileVerdict::Accepted(item) => {
                    seen.insert(item.path.clone());
                    log::debug!("Found {:?}", item.path);
                    result.items.push(item);
                }
                FileVerdict::Bios => {
                    log::debug!("Skipping BIOS file {:?}", entry.path());
                    result.excluded_files += 1;
                }
                FileVerdict::Skipped => {}
            }
        }
    }

    if config.multidisc {
        tag_multidisc(&mut result.items);
    }

    progress.set_percentage(100);
    progress.set_message(&format!("Found {} files", result.items.len()));
    result.duration_ms = start.elapsed().as_millis() as u64;
    Outcome::Completed(result)
}

/// Classify a single file against the BIOS marker and extension filter
fn process_file(path: &Path, config: &ScanConfig, order: usize) -> FileVerdict {
    let base_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    if config.is_bios(&base_name) {
        return FileVerdict::Bios;
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !config.should_include_extension(&extension) {
        return FileVerdict::Skipped;
    }

    FileVerdict::Accepted(ScannedItem::new(
        path.to_path_buf(),
        base_name,
        extension,
        order,
    ))
}

/// Attach disc positions and shared multi-disc sets to matching items
///
/// Items keep their own entries; only metadata is added.
fn tag_multidisc(items: &mut [ScannedItem]) {
    let mut sets: HashMap<(String, String), Vec<DiscInfo>> = HashMap::new();
    let mut titles: Vec<Option<String>> = Vec::with_capacity(items.len());

    for item in items.iter_mut() {
        match parse_disc_name(&item.base_name) {
            Some((title, disc)) => {
                item.disc = Some(disc);
                sets.entry((title.clone(), item.extension.clone()))
                    .or_default()
                    .push(disc);
                titles.push(Some(title));
            }
            None => titles.push(None),
        }
    }

    for discs in sets.values_mut() {
        discs.sort();
        discs.dedup();
    }

    for (item, title) in items.iter_mut().zip(titles) {
        let Some(title) = title else { continue };
        if let Some(discs) = sets.get(&(title.clone(), item.extension.clone())) {
            item.multidisc = Some(MultiDiscSet {
                title,
                discs: discs.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use proptest::prelude::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"rom").unwrap();
        path
    }

    fn zip_config(root: &Path) -> ScanConfig {
        ScanConfig::builder()
            .add_root(root.to_path_buf())
            .extensions(ScanConfig::parse_extensions("zip"))
            .build()
    }

    fn names(result: &WalkResult) -> Vec<String> {
        result
            .items
            .iter()
            .map(|i| i.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    struct CancelAfter(usize);

    impl ProgressPort for CancelAfter {
        fn set_percentage(&mut self, _percentage: u8) {}
        fn set_message(&mut self, _message: &str) {}
        fn is_cancelled(&self) -> bool {
            self.0 == 0
        }
    }

    #[test]
    fn test_parse_disc_name() {
        let (title, disc) = parse_disc_name("donkey kong (Disc 1 of 2)").unwrap();
        assert_eq!(title, "donkey kong");
        assert_eq!(disc, DiscInfo { index: 1, total: 2 });

        let (title, disc) = parse_disc_name("Riven (USA) (disc 3 of 5) [!]").unwrap();
        assert_eq!(title, "Riven (USA)");
        assert_eq!(disc, DiscInfo { index: 3, total: 5 });

        assert!(parse_disc_name("donkey kong").is_none());
        assert!(parse_disc_name("(Disc 1 of 2)").is_none());
        assert!(parse_disc_name("game (Disc 3 of 2)").is_none());
        assert!(parse_disc_name("game (Disc 0 of 2)").is_none());
        assert!(parse_disc_name("game (Disc 99999999999 of 99999999999)").is_none());
    }

    #[test]
    fn test_walk_filters_extensions() {
        let dir = TempDir::new().unwrap();
        for name in ["myfile.dot", "donkey_kong.zip", "tetris.zip", "thumbs.db", "duckhunt.zip"] {
            touch(dir.path(), name);
        }

        let result = walk(&zip_config(dir.path()), &mut NoProgress)
            .completed()
            .unwrap();

        assert!(result.is_success());
        assert_eq!(names(&result), vec!["donkey_kong.zip", "duckhunt.zip", "tetris.zip"]);
        assert!(result.items.iter().all(|i| i.extension == "zip"));
        assert_eq!(result.items[0].base_name, "donkey_kong");
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "ZELDA.ZIP");

        let result = walk(&zip_config(dir.path()), &mut NoProgress)
            .completed()
            .unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].extension, "zip");
    }

    #[test]
    fn test_walk_excludes_bios_files() {
        let dir = TempDir::new().unwrap();
        for name in ["zelda.zip", "[BIOS] dinkytoy.zip", "[BIOS] readme.txt"] {
            touch(dir.path(), name);
        }

        let result = walk(&zip_config(dir.path()), &mut NoProgress)
            .completed()
            .unwrap();
        assert_eq!(names(&result), vec!["zelda.zip"]);
        assert_eq!(result.excluded_files, 2);
    }

    #[test]
    fn test_multidisc_tagging_keeps_every_disc() {
        let dir = TempDir::new().unwrap();
        for name in [
            "zekda.zip",
            "donkey kong (Disc 1 of 2).zip",
            "donkey kong (Disc 2 of 2).zip",
            "tetris.zip",
        ] {
            touch(dir.path(), name);
        }
        let config = ScanConfig::builder()
            .add_root(dir.path().to_path_buf())
            .extensions(ScanConfig::parse_extensions("zip"))
            .multidisc(true)
            .build();

        let result = walk(&config, &mut NoProgress).completed().unwrap();
        assert_eq!(result.items.len(), 4);

        let discs: Vec<&ScannedItem> = result.items.iter().filter(|i| i.disc.is_some()).collect();
        assert_eq!(discs.len(), 2);
        assert_eq!(discs[0].disc, Some(DiscInfo { index: 1, total: 2 }));
        assert_eq!(discs[1].disc, Some(DiscInfo { index: 2, total: 2 }));

        for disc in discs {
            let set = disc.multidisc.as_ref().unwrap();
            assert_eq!(set.title, "donkey kong");
            assert_eq!(set.discs.len(), 2);
            assert!(set.is_complete());
        }

        let tetris = result.items.iter().find(|i| i.base_name == "tetris").unwrap();
        assert!(tetris.disc.is_none());
        assert!(tetris.multidisc.is_none());
    }

    #[test]
    fn test_multidisc_sets_split_by_extension() {
        let dir = TempDir::new().unwrap();
        for name in ["riven (Disc 1 of 2).cue", "riven (Disc 2 of 2).cue", "riven (Disc 1 of 2).chd"] {
            touch(dir.path(), name);
        }
        let config = ScanConfig::builder()
            .add_root(dir.path().to_path_buf())
            .extensions(ScanConfig::parse_extensions("cue|chd"))
            .multidisc(true)
            .build();

        let result = walk(&config, &mut NoProgress).completed().unwrap();
        assert_eq!(result.items.len(), 3);

        let chd = result.items.iter().find(|i| i.extension == "chd").unwrap();
        assert_eq!(chd.multidisc.as_ref().unwrap().discs.len(), 1);

        let cue = result.items.iter().find(|i| i.extension == "cue").unwrap();
        assert_eq!(cue.multidisc.as_ref().unwrap().discs.len(), 2);
    }

    #[test]
    fn test_multidisc_disabled_leaves_names_alone() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "donkey kong (Disc 1 of 2).zip");

        let result = walk(&zip_config(dir.path()), &mut NoProgress)
            .completed()
            .unwrap();
        assert_eq!(result.items.len(), 1);
        assert!(result.items[0].disc.is_none());
        assert!(result.items[0].multidisc.is_none());
    }

    #[test]
    fn test_non_recursive_walk() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.zip");
        touch(dir.path(), "nested/deep.zip");

        let recursive = walk(&zip_config(dir.path()), &mut NoProgress)
            .completed()
            .unwrap();
        assert_eq!(recursive.items.len(), 2);

        let mut config = zip_config(dir.path());
        config.recursive = false;
        let flat = walk(&config, &mut NoProgress).completed().unwrap();
        assert_eq!(names(&flat), vec!["top.zip"]);
    }

    #[test]
    fn test_ignored_directories_are_pruned() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "keep/a.zip");
        touch(dir.path(), ".git/b.zip");
        touch(dir.path(), "$RECYCLE.BIN/c.zip");

        let result = walk(&zip_config(dir.path()), &mut NoProgress)
            .completed()
            .unwrap();
        assert_eq!(names(&result), vec!["a.zip"]);
    }

    #[test]
    fn test_missing_root_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.zip");
        let config = ScanConfig::builder()
            .add_root(dir.path().join("missing"))
            .add_root(dir.path().to_path_buf())
            .extensions(ScanConfig::parse_extensions("zip"))
            .build();

        let result = walk(&config, &mut NoProgress).completed().unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].kind, crate::error::ScanErrorKind::NotFound);
    }

    #[test]
    fn test_walk_order_is_stable() {
        let dir = TempDir::new().unwrap();
        for name in ["c.zip", "a.zip", "sub/b.zip", "d.zip"] {
            touch(dir.path(), name);
        }
        let config = zip_config(dir.path());

        let first = walk(&config, &mut NoProgress).completed().unwrap();
        let second = walk(&config, &mut NoProgress).completed().unwrap();
        assert_eq!(first.items, second.items);
        assert_eq!(
            first.items.iter().map(|i| i.order).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_relative_root_yields_absolute_paths() {
        let dir = TempDir::new_in(".").unwrap();
        touch(dir.path(), "zelda.zip");
        let cwd = std::env::current_dir().unwrap();
        let relative = dir.path().strip_prefix(&cwd).unwrap_or(dir.path()).to_path_buf();
        assert!(relative.is_relative());

        let result = walk(&zip_config(&relative), &mut NoProgress).completed().unwrap();
        assert_eq!(result.items.len(), 1);
        assert!(result.items[0].path.is_absolute());
        assert!(result.items[0].path.ends_with("zelda.zip"));
    }

    #[test]
    fn test_overlapping_roots_report_each_file_once() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.zip");
        touch(dir.path(), "sub/deep.zip");
        let config = ScanConfig::builder()
            .add_root(dir.path().to_path_buf())
            .add_root(dir.path().join("sub"))
            .add_root(dir.path().to_path_buf())
            .extensions(ScanConfig::parse_extensions("zip"))
            .build();

        let result = walk(&config, &mut NoProgress).completed().unwrap();
        assert_eq!(names(&result), vec!["deep.zip", "top.zip"]);
        assert_eq!(
            result.items.iter().map(|i| i.order).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.zip");
        touch(dir.path(), "locked/hidden.zip");
        touch(dir.path(), "open/b.zip");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // permissions do not apply to a privileged user
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = walk(&zip_config(dir.path()), &mut NoProgress).completed().unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(names(&result), vec!["a.zip", "b.zip"]);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].kind, crate::error::ScanErrorKind::PermissionDenied);
    }

    #[test]
    fn test_walk_cancellation() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.zip");

        let outcome = walk(&zip_config(dir.path()), &mut CancelAfter(0));
        assert!(outcome.is_cancelled());
    }

    proptest! {
        #[test]
        fn prop_bios_files_never_scanned(
            files in proptest::collection::vec(("[a-z]{1,8}", any::<bool>(), prop_oneof!["zip", "7z", "txt"]), 1..12)
        ) {
            let dir = TempDir::new().unwrap();
            for (i, (stem, bios, ext)) in files.iter().enumerate() {
                let name = if *bios {
                    format!("[BIOS] {}{}.{}", stem, i, ext)
                } else {
                    format!("{}{}.{}", stem, i, ext)
                };
                touch(dir.path(), &name);
            }
            let config = ScanConfig::builder()
                .add_root(dir.path().to_path_buf())
                .extensions(ScanConfig::parse_extensions("zip|7z"))
                .build();

            let result = walk(&config, &mut NoProgress).completed().unwrap();
            prop_assert!(result.items.iter().all(|i| !i.base_name.starts_with("[BIOS]")));

            let expected = files.iter().filter(|(_, bios, ext)| !*bios && ext != "txt").count();
            prop_assert_eq!(result.items.len(), expected);
            prop_assert_eq!(result.excluded_files as usize, files.iter().filter(|(_, bios, _)| *bios).count());
        }
    }
}
