//! ROM Scanner CLI
//!
//! Scans ROM folders into a SQLite inventory and matches file names against
//! offline platform catalogs.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rom_scanner::config::DEFAULT_MAX_DEPTH;
use rom_scanner::progress::{JsonProgress, NoProgress, ProgressPort};
use rom_scanner::{
    OfflineScraper, Outcome, PlatformRegistry, RomFolderScanner, ScanConfig, ScanError, ScannerSettings,
    SqliteInventory,
};

const ABOUT: &str = r#"
ROM Scanner - ROM folder scanner and offline catalog matcher

Examples:
  rom_scanner scan -s snes -r /roms/snes -e "zip|sfc"      Scan and store new ROMs
  rom_scanner scan -s psx --settings psx.json --multidisc  Scan using a settings file
  rom_scanner scan -s snes -r /roms/snes --dry-run --json  Only report what changed
  rom_scanner match -p "Nintendo SNES" -c catalogs "Super Mario World (USA)"
  rom_scanner platforms                                    List catalog platforms
"#;

/// ROM folder scanner and offline catalog matcher
#[derive(Parser)]
#[command(name = "rom_scanner")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan ROM folders and reconcile them with the inventory
    Scan {
        /// Scanner id owning the inventory entries
        #[arg(short = 's', long)]
        scanner_id: String,

        /// Root directories to scan (repeatable)
        #[arg(short = 'r', long = "root")]
        roots: Vec<PathBuf>,

        /// Scanner settings JSON document
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Accepted extensions, e.g. "zip|7z|sfc"
        #[arg(short = 'e', long)]
        ext: Option<String>,

        /// SQLite inventory database
        #[arg(short = 'd', long, default_value = "rom_scanner.db")]
        db: PathBuf,

        /// Only scan the root directories
        #[arg(long)]
        no_recursive: bool,

        /// Maximum recursion depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Tag "<title> (Disc n of m)" files as multi-disc sets
        #[arg(long)]
        multidisc: bool,

        /// Files starting with this token are skipped
        #[arg(long)]
        bios_marker: Option<String>,

        /// Write a text report to this file or directory
        #[arg(long)]
        report: Option<PathBuf>,

        /// Classify only, do not change the inventory
        #[arg(long)]
        dry_run: bool,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find catalog candidates for a file name
    Match {
        /// Platform name
        #[arg(short = 'p', long)]
        platform: String,

        /// Directory holding the catalog files
        #[arg(short = 'c', long, default_value = "catalogs")]
        catalog_dir: PathBuf,

        /// File base name to look up
        name: String,

        /// Also print the metadata of the best candidate
        #[arg(short = 'm', long)]
        metadata: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the platforms with an offline catalog
    Platforms {
        /// Print the registry as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Scan {
            scanner_id,
            roots,
            settings,
            ext,
            db,
            no_recursive,
            max_depth,
            multidisc,
            bios_marker,
            report,
            dry_run,
            progress,
            json,
        }) => {
            let config = match settings {
                Some(path) => ScannerSettings::from_file(&path).map(|s| ScanConfig::from_settings(&s)),
                None => Ok(ScanConfig::default()),
            };
            config.and_then(|mut config| {
                config.roots.extend(roots);
                if let Some(ext) = ext {
                    config.extensions = ScanConfig::parse_extensions(&ext);
                }
                if no_recursive {
                    config.recursive = false;
                }
                config.max_depth = max_depth;
                config.multidisc |= multidisc;
                if let Some(marker) = bios_marker {
                    config.bios_marker = marker;
                }
                config.report_path = report;
                run_scan(&scanner_id, config, &db, dry_run, progress, json)
            })
        }
        Some(Commands::Match {
            platform,
            catalog_dir,
            name,
            metadata,
            json,
        }) => run_match(&platform, catalog_dir, &name, metadata, json),
        Some(Commands::Platforms { json }) => run_platforms(json),
        None => {
            println!("{}", ABOUT);
            println!("Use 'rom_scanner --help' for all options");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_scan(
    scanner_id: &str,
    config: ScanConfig,
    db: &Path,
    dry_run: bool,
    progress: bool,
    json: bool,
) -> Result<(), ScanError> {
    if config.roots.is_empty() {
        return Err(ScanError::config("No root directory given (use --root or --settings)"));
    }

    info!("Starting ROM scan for scanner {}", scanner_id);
    info!("Roots: {:?}", config.roots);
    info!("Recursive: {}", config.recursive);
    info!("Multi-disc: {}", config.multidisc);

    let inventory = SqliteInventory::open(db).map_err(|e| ScanError::from(e).with_path(db))?;
    let mut scanner = RomFolderScanner::new(scanner_id, config, inventory);

    let mut json_port = progress.then(|| JsonProgress::stderr(200));
    let mut silent = NoProgress;
    let port: &mut dyn ProgressPort = match json_port.as_mut() {
        Some(json_port) => json_port,
        None => &mut silent,
    };

    if scanner.scan(port)?.is_cancelled() {
        info!("Scan cancelled");
        return Ok(());
    }

    let mut commit_failed = false;
    let (stored, removed) = if dry_run {
        info!("Dry run, inventory left unchanged");
        (0, 0)
    } else {
        let (stored, removed) = scanner.commit();
        let mut count = |half: Result<usize, ScanError>| {
            half.unwrap_or_else(|e| {
                error!("Scanner {}: {}", scanner.scanner_id(), e);
                commit_failed = true;
                0
            })
        };
        (count(stored), count(removed))
    };

    let Some(summary) = scanner.summary() else {
        return Ok(());
    };
    if let Some(json_port) = json_port.as_mut() {
        json_port.report_done(summary);
    }

    if json {
        let output = serde_json::to_string_pretty(summary)?;
        println!("{}", output);
    } else {
        println!("Scan completed:");
        println!("  Files found: {}", summary.total_files);
        println!("  Dirs: {}", summary.total_dirs);
        println!("  BIOS excluded: {}", summary.excluded_files);
        println!("  New files: {}", summary.new_files);
        println!("  Existing files: {}", summary.existing_files);
        println!("  Dead entries: {}", summary.dead_files);
        println!("  Stored: {}", stored);
        println!("  Removed: {}", removed);
        println!("  Errors: {}", summary.error_count());
        println!("  Duration: {}ms", summary.duration_ms);
    }

    if commit_failed {
        return Err(ScanError::inventory("Inventory was not fully updated, run the scan again"));
    }
    Ok(())
}

fn run_match(
    platform: &str,
    catalog_dir: PathBuf,
    name: &str,
    metadata: bool,
    json: bool,
) -> Result<(), ScanError> {
    let mut scraper = OfflineScraper::with_catalog_root(catalog_dir);
    let candidates = match scraper.get_candidates(name, platform, &mut NoProgress) {
        Outcome::Completed(candidates) => candidates,
        Outcome::Cancelled => return Ok(()),
    };
    let best = candidates
        .first()
        .filter(|_| metadata)
        .map(|c| scraper.get_metadata(platform, &c.key));

    if json {
        let output = serde_json::json!({ "candidates": candidates, "metadata": best });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if candidates.is_empty() {
        println!("No candidates for {:?} on {}", name, platform);
    }
    for candidate in &candidates {
        println!("{:>3}  {}  ({})", candidate.weight, candidate.display_name, candidate.key);
    }
    if let Some(meta) = best {
        println!();
        println!("Title:     {}", meta.title);
        println!("Year:      {}", meta.year);
        println!("Genre:     {}", meta.genre);
        println!("Developer: {}", meta.developer);
        println!("Players:   {}", meta.nplayers);
        println!("Rating:    {}", meta.rating);
        println!("Plot:      {}", meta.plot);
    }
    Ok(())
}

fn run_platforms(json: bool) -> Result<(), ScanError> {
    let registry = PlatformRegistry::builtin();
    if json {
        println!("{}", serde_json::to_string_pretty(registry.platforms())?);
        return Ok(());
    }
    for platform in registry.platforms() {
        match &platform.alias_of {
            Some(target) => println!("{} -> {}", platform.name, target),
            None => println!("{} ({:?}, {})", platform.name, platform.kind, platform.file_name),
        }
    }
    Ok(())
}
