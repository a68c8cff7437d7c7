//! Plain text scan report

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::models::{ReconciliationResult, ScanSummary};

/// Diagnostic report of one scan pass
pub struct ScanReport<'a> {
    pub scanner_id: &'a str,
    pub config: &'a ScanConfig,
    pub summary: &'a ScanSummary,
    pub result: &'a ReconciliationResult,
    pub generated_at: DateTime<Utc>,
}

impl ScanReport<'_> {
    /// Render the report text
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "ROM scan report")?;
        writeln!(out, "Scanner:   {}", self.scanner_id)?;
        writeln!(out, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(out, "Roots:")?;
        for root in &self.config.roots {
            writeln!(out, "  {}", root.display())?;
        }
        writeln!(
            out,
            "Multi-disc: {}",
            if self.config.multidisc { "enabled" } else { "disabled" }
        )?;
        writeln!(out)?;

        let s = self.summary;
        writeln!(out, "Files found:   {}", s.total_files)?;
        writeln!(out, "BIOS excluded: {}", s.excluded_files)?;
        writeln!(out, "New:           {}", s.new_files)?;
        writeln!(out, "Existing:      {}", s.existing_files)?;
        writeln!(out, "Dead:          {}", s.dead_files)?;
        writeln!(out, "Errors:        {}", s.error_count())?;
        writeln!(out, "Duration:      {}ms", s.duration_ms)?;

        if !self.result.new_items.is_empty() {
            writeln!(out)?;
            writeln!(out, "New files:")?;
            for item in &self.result.new_items {
                match item.disc {
                    Some(disc) => writeln!(out, "  {} [{}]", item.path.display(), disc)?,
                    None => writeln!(out, "  {}", item.path.display())?,
                }
            }
        }

        if !self.result.dead_ids.is_empty() {
            writeln!(out)?;
            writeln!(out, "Dead entries:")?;
            for id in &self.result.dead_ids {
                writeln!(out, "  {}", id)?;
            }
        }

        if !s.errors.is_empty() {
            writeln!(out)?;
            writeln!(out, "Errors:")?;
            for error in &s.errors {
                writeln!(out, "  {}", error)?;
            }
        }
        Ok(())
    }

    /// Write the report and return the file written
    ///
    /// An existing directory receives `<scanner id>_report.txt`; any other
    /// path is used as the file name.
    pub fn write_to(&self, path: &Path) -> io::Result<PathBuf> {
        let target = if path.is_dir() {
            path.join(format!("{}_report.txt", self.scanner_id))
        } else {
            path.to_path_buf()
        };
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, self.render())?;
        Ok(target)
    }
}
