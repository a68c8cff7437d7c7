//! Candidate matching and metadata lookup against offline catalogs

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::catalog::{CatalogCache, CatalogKind, CatalogRecord, PlatformCatalog, PlatformRegistry};
use crate::models::{CandidateMatch, GameMetadata, Outcome};
use crate::progress::{percentage, ProgressPort};

/// Release decorations such as `(USA)`, `(Rev 1)` or `[!]`
static DECORATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("valid decoration regex"));

/// Strip bracketed decorations and collapse whitespace
pub fn normalize_name(name: &str) -> String {
    let stripped = DECORATION_PATTERN.replace_all(name, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rank weight of a fuzzy candidate
pub fn score(display_name: &str, raw: &str, normalized: &str) -> u32 {
    let mut weight = 1;
    if normalized == display_name {
        weight += 1;
    }
    if raw == display_name {
        weight += 1;
    }
    if !normalized.is_empty() && display_name.starts_with(normalized) {
        weight += 1;
    }
    weight
}

/// Name a record is presented and compared under
fn display_name(kind: CatalogKind, record: &CatalogRecord) -> &str {
    match kind {
        CatalogKind::ExactKey if !record.title.is_empty() => &record.title,
        _ => &record.key,
    }
}

fn candidate(catalog: &PlatformCatalog, record: &CatalogRecord, platform: &str, weight: u32) -> CandidateMatch {
    CandidateMatch {
        key: record.key.clone(),
        display_name: display_name(catalog.kind(), record).to_string(),
        platform: platform.to_string(),
        weight,
    }
}

/// Look up a ROM set name in an exact-key catalog
pub fn match_exact_key(catalog: &PlatformCatalog, base_name: &str, platform: &str) -> Vec<CandidateMatch> {
    catalog
        .get(base_name)
        .map(|record| vec![candidate(catalog, record, platform, 1)])
        .unwrap_or_default()
}

/// Match a file name against the release names of a general catalog
pub fn match_general(
    catalog: &PlatformCatalog,
    base_name: &str,
    platform: &str,
    progress: &mut dyn ProgressPort,
) -> Outcome<Vec<CandidateMatch>> {
    if let Some(record) = catalog.records().iter().find(|r| r.key == base_name) {
        return Outcome::Completed(vec![candidate(catalog, record, platform, 1)]);
    }

    let normalized = normalize_name(base_name);
    let pattern = match Regex::new(&format!("(?i){}", regex::escape(base_name))) {
        Ok(pattern) => pattern,
        Err(e) => {
            log::warn!("Cannot build search pattern for {:?}: {}", base_name, e);
            return Outcome::Completed(Vec::new());
        }
    };

    let total = catalog.len();
    let mut candidates = Vec::new();
    for (i, record) in catalog.records().iter().enumerate() {
        if progress.is_cancelled() {
            return Outcome::Cancelled;
        }
        progress.set_percentage(percentage(i, total));

        let name = display_name(catalog.kind(), record);
        if pattern.is_match(name) {
            let weight = score(name, base_name, &normalized);
            candidates.push(candidate(catalog, record, platform, weight));
        }
    }

    candidates.sort_by(|a, b| b.weight.cmp(&a.weight));
    log::debug!("{} candidates for {:?} on {}", candidates.len(), base_name, platform);
    Outcome::Completed(candidates)
}

/// Resolve candidates using the strategy of the catalog kind
pub fn find_candidates(
    catalog: &PlatformCatalog,
    base_name: &str,
    platform: &str,
    progress: &mut dyn ProgressPort,
) -> Outcome<Vec<CandidateMatch>> {
    if base_name.trim().is_empty() {
        return Outcome::Completed(Vec::new());
    }
    match catalog.kind() {
        CatalogKind::ExactKey => Outcome::Completed(match_exact_key(catalog, base_name, platform)),
        CatalogKind::General => match_general(catalog, base_name, platform, progress),
        CatalogKind::Unknown => Outcome::Completed(Vec::new()),
    }
}

/// Metadata of the record stored under `key`
pub fn metadata_for(catalog: &PlatformCatalog, key: &str) -> GameMetadata {
    let Some(record) = catalog.get(key) else {
        return GameMetadata::default();
    };
    match catalog.kind() {
        CatalogKind::ExactKey => GameMetadata {
            title: record.title.clone(),
            year: record.year.clone(),
            genre: record.genre.clone(),
            developer: record.developer.clone(),
            nplayers: record.nplayers.clone(),
            ..Default::default()
        },
        CatalogKind::General => GameMetadata {
            title: record.title.clone(),
            year: record.year.clone(),
            genre: record.genre.clone(),
            developer: record.developer.clone(),
            nplayers: record.nplayers.clone(),
            rating: record.rating.clone(),
            plot: record.plot.clone(),
        },
        CatalogKind::Unknown => GameMetadata::default(),
    }
}

/// Scraper answering candidate and metadata requests from offline catalogs
pub struct OfflineScraper {
    cache: CatalogCache,
}

impl OfflineScraper {
    pub fn new(cache: CatalogCache) -> Self {
        Self { cache }
    }

    /// Scraper over the built-in platforms with catalogs under `root`
    pub fn with_catalog_root(root: impl Into<PathBuf>) -> Self {
        Self::new(CatalogCache::new(root, PlatformRegistry::builtin()))
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Ranked candidates for a file base name, best first
    pub fn get_candidates(
        &mut self,
        base_name: &str,
        platform: &str,
        progress: &mut dyn ProgressPort,
    ) -> Outcome<Vec<CandidateMatch>> {
        let catalog = self.cache.load(platform);
        find_candidates(catalog, base_name, platform, progress)
    }

    /// Metadata for a candidate key, empty when unknown
    pub fn get_metadata(&mut self, platform: &str, key: &str) -> GameMetadata {
        let catalog = self.cache.load(platform);
        metadata_for(catalog, key)
    }
}
