use crate::export_core::cleanup::CleanupReport;
use crate::export_core::config::Settings;
use crate::export_core::error::Result;
use crate::export_core::osxphotos::ExportSummary;
use crate::export_core::symlinks::SyncReport;
use crate::export_core::tree::ExportStats;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Depth shown in the directory summary.
pub const TREE_DEPTH: usize = 2;

/// Everything a run produced, for the final report.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub export: ExportSummary,
    pub stats: Option<ExportStats>,
    pub symlinks: Option<SyncReport>,
    pub cleanup: Option<CleanupReport>,
}

impl RunSummary {
    /// Per-item failures from the symlink and cleanup passes.
    pub fn failure_count(&self) -> usize {
        self.symlinks.as_ref().map_or(0, |s| s.failures.len())
            + self.cleanup.as_ref().map_or(0, |c| c.failures.len())
    }
}

/// Banner printed before anything runs.
pub fn print_banner(settings: &Settings) {
    if settings.quiet {
        return;
    }
    println!("OSXPhotos to Nextcloud Export");
    println!("─────────────────────────────────");
    println!("Export:    {}", settings.export_dir.display());
    println!("Nextcloud: {}", settings.nc_photos_dir.display());
    println!("Dry Run:   {}", settings.dry_run);
    println!();
}

/// Summary lines shared by the console and the log.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let export = &summary.export;

    if export.reported {
        lines.push(format!(
            "Exported:  {:>8} ({} updated, {} skipped, {} missing, {} errors)",
            export.exported, export.updated, export.skipped, export.missing, export.errors
        ));
    } else {
        lines.push(format!(
            "Exported:  {:>8} (no summary reported by osxphotos)",
            "unknown"
        ));
    }

    if let Some(stats) = &summary.stats {
        lines.push(format!(
            "Library:   {:>8} files ({:.1} MB) in {} years, {} months",
            stats.total_files,
            stats.size_mb(),
            stats.year_dirs,
            stats.month_dirs
        ));
    }

    match &summary.symlinks {
        Some(sync) if sync.skipped => lines.push("Symlinks:  skipped".to_string()),
        Some(sync) => lines.push(format!(
            "Symlinks:  {:>8} created, {} updated, {} removed, {} unchanged{}",
            sync.created,
            sync.updated,
            sync.removed,
            sync.unchanged,
            failures_suffix(sync.failures.len())
        )),
        None => {}
    }

    if let Some(cleanup) = &summary.cleanup {
        lines.push(format!(
            "Cleanup:   {:>8} files, {} empty directories removed{}",
            cleanup.files_removed.len(),
            cleanup.dirs_removed.len(),
            failures_suffix(cleanup.failures.len())
        ));
    }

    lines
}

fn failures_suffix(failures: usize) -> String {
    if failures == 0 {
        String::new()
    } else {
        format!(", {} failed", failures)
    }
}

/// Log the summary and, unless quiet, print it with a directory overview.
pub fn generate_report(settings: &Settings, summary: &RunSummary) {
    log::info!("Generating final report...");

    let lines = summary_lines(summary);
    for line in &lines {
        log::info!("{}", line);
    }

    if !settings.quiet {
        println!();
        println!("Export Summary{}", if settings.dry_run { " [DRY RUN]" } else { "" });
        println!("─────────────────────────────────");
        for line in &lines {
            println!("{}", line);
        }
    }

    if settings.nc_photos_dir.is_dir() {
        match render_tree(&settings.nc_photos_dir, TREE_DEPTH) {
            Ok(tree) => {
                log::debug!("Directory structure:\n{}", tree);
                if !settings.quiet {
                    println!("\nDirectory Structure:\n{}", tree);
                }
            }
            Err(e) => log::warn!("Failed to list {}: {}", settings.nc_photos_dir.display(), e),
        }
    }

    log::info!("Full log available at: {}", settings.log_file.display());
    if !settings.quiet {
        println!("Log file: {}", settings.log_file.display());
    }
}

/// Render the directories under `root` down to `depth` levels, following
/// symlinks, in the style of `tree -d`.
pub fn render_tree(root: &Path, depth: usize) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "{}", root.display());
    let count = render_level(root, depth, "", &mut out)?;
    let _ = write!(
        out,
        "\n{} {}",
        count,
        if count == 1 { "directory" } else { "directories" }
    );
    Ok(out)
}

fn render_level(dir: &Path, depth: usize, prefix: &str, out: &mut String) -> Result<usize> {
    if depth == 0 {
        return Ok(0);
    }

    let mut children: Vec<(String, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| fs::metadata(e.path()).map(|m| m.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            (!name.starts_with('.')).then_some((name, e.path()))
        })
        .collect();
    children.sort();

    let mut count = 0;
    let last = children.len().saturating_sub(1);
    for (i, (name, path)) in children.iter().enumerate() {
        let (branch, indent) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        match fs::read_link(path) {
            Ok(target) => {
                let _ = writeln!(out, "{}{}{} -> {}", prefix, branch, name, target.display());
            }
            Err(_) => {
                let _ = writeln!(out, "{}{}{}", prefix, branch, name);
            }
        }
        count += 1;
        count += render_level(path, depth - 1, &format!("{}{}", prefix, indent), out)?;
    }

    Ok(count)
}
