//! Metadata and assets stored next to the ROM files
//!
//! An NFO sidecar is an XML file named after the ROM:
//!
//! ```xml
//! <game>
//!   <title>Dr. Mario</title>
//!   <year>1990</year>
//!   <genre>Puzzle</genre>
//! </game>
//! ```

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::models::GameMetadata;

/// Extensions accepted as local artwork or video
pub const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "mp4", "avi", "mkv"];

/// Path of the NFO sidecar for a ROM
pub fn nfo_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("nfo")
}

/// Parse NFO content
pub fn parse_nfo(content: &str) -> Result<GameMetadata, ScanError> {
    let mut xml = Reader::from_str(content);
    xml.config_mut().trim_text(true);

    let mut meta = GameMetadata::default();
    let mut in_game = false;
    let mut current_tag = String::new();

    loop {
        let event = xml
            .read_event()
            .map_err(|e| ScanError::config(format!("Invalid NFO: {}", e)))?;
        match event {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "game" {
                    in_game = true;
                } else {
                    current_tag = tag;
                }
            }
            Event::Text(ref e) if in_game => {
                let text = e
                    .unescape()
                    .map_err(|e| ScanError::config(format!("Invalid NFO text: {}", e)))?
                    .to_string();
                match current_tag.as_str() {
                    "title" => meta.title = text,
                    "year" => meta.year = text,
                    "genre" => meta.genre = text,
                    "developer" => meta.developer = text,
                    "nplayers" => meta.nplayers = text,
                    "esrb" => meta.rating = text,
                    "plot" => meta.plot = text,
                    _ => {}
                }
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"game" {
                    in_game = false;
                }
                current_tag.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(meta)
}

/// Read the NFO sidecar of a ROM
///
/// Returns `None` when there is no sidecar or it cannot be parsed.
pub fn metadata_from_nfo(rom_path: &Path) -> Option<GameMetadata> {
    let path = nfo_path(rom_path);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No NFO file at {:?}", path);
            return None;
        }
        Err(e) => {
            log::warn!("Could not read NFO file {:?}: {}", path, e);
            return None;
        }
    };

    match parse_nfo(&content) {
        Ok(meta) => Some(meta),
        Err(e) => {
            log::warn!("Skipping NFO file {:?}: {}", path, e);
            None
        }
    }
}

/// Find an asset in `asset_dir` named after the ROM
pub fn find_local_asset(asset_dir: &Path, rom_path: &Path) -> Option<PathBuf> {
    let base = rom_path.file_stem()?.to_string_lossy().to_lowercase();
    let entries = match fs::read_dir(asset_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot list asset directory {:?}: {}", asset_dir, e);
            return None;
        }
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let stem_matches = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase() == base)
                .unwrap_or(false);
            let ext_matches = path
                .extension()
                .map(|e| {
                    let ext = e.to_string_lossy().to_lowercase();
                    ASSET_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false);
            stem_matches && ext_matches
        })
        .collect();

    // read_dir order is unspecified
    found.sort();
    found.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PITFALL_NFO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<game>
    <title>Pitfall!</title>
    <year>1982</year>
    <genre>Platform</genre>
    <developer>Activision</developer>
    <nplayers>1</nplayers>
    <esrb>E</esrb>
    <plot>Pitfall Harry &amp; the jungle.</plot>
    <rating>8.5</rating>
</game>
"#;

    #[test]
    fn test_parse_nfo_reads_all_fields() {
        let meta = parse_nfo(PITFALL_NFO).unwrap();
        assert_eq!(meta.title, "Pitfall!");
        assert_eq!(meta.year, "1982");
        assert_eq!(meta.genre, "Platform");
        assert_eq!(meta.developer, "Activision");
        assert_eq!(meta.nplayers, "1");
        assert_eq!(meta.rating, "E");
        assert_eq!(meta.plot, "Pitfall Harry & the jungle.");
    }

    #[test]
    fn test_parse_nfo_ignores_text_outside_game() {
        let meta = parse_nfo("<launcher><title>Not a game</title></launcher>").unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn test_metadata_from_nfo() {
        let dir = TempDir::new().unwrap();
        let rom = dir.path().join("dr_mario.zip");
        fs::write(&rom, b"rom").unwrap();
        fs::write(
            dir.path().join("dr_mario.nfo"),
            "<game><title>Dr. Mario</title><genre>Puzzle</genre></game>",
        )
        .unwrap();

        let meta = metadata_from_nfo(&rom).unwrap();
        assert_eq!(meta.title, "Dr. Mario");
        assert_eq!(meta.genre, "Puzzle");
    }

    #[test]
    fn test_metadata_from_nfo_missing_or_broken() {
        let dir = TempDir::new().unwrap();
        assert!(metadata_from_nfo(&dir.path().join("tetris.zip")).is_none());

        fs::write(dir.path().join("broken.nfo"), "<game><title>Oops</year></game>").unwrap();
        assert!(metadata_from_nfo(&dir.path().join("broken.zip")).is_none());
    }

    #[test]
    fn test_find_local_asset() {
        let dir = TempDir::new().unwrap();
        let titles = dir.path().join("titles");
        fs::create_dir(&titles).unwrap();
        fs::write(titles.join("Pitfall.jpg"), b"img").unwrap();
        fs::write(titles.join("pitfall.txt"), b"txt").unwrap();
        fs::write(titles.join("tetris.png"), b"img").unwrap();

        let found = find_local_asset(&titles, Path::new("/roms/atari/pitfall.zip"));
        assert_eq!(found, Some(titles.join("Pitfall.jpg")));

        assert!(find_local_asset(&titles, Path::new("/roms/atari/zaxxon.zip")).is_none());
        assert!(find_local_asset(&dir.path().join("missing"), Path::new("/roms/pitfall.zip")).is_none());
    }
}
