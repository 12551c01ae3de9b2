use crate::export_core::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A `{year}` directory in the export root with its `{month}` subdirectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearDir {
    pub name: String,
    pub path: PathBuf,
    pub months: Vec<String>,
}

/// Totals over the export root after an export.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportStats {
    pub year_dirs: usize,
    pub month_dirs: usize,
    pub total_files: u64,
    pub total_size: u64,
}

impl ExportStats {
    pub fn size_mb(&self) -> f64 {
        self.total_size as f64 / 1_048_576.0
    }
}

/// Four ASCII digits.
pub fn is_year_name(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Two ASCII digits.
pub fn is_month_name(name: &str) -> bool {
    name.len() == 2 && name.bytes().all(|b| b.is_ascii_digit())
}

/// List the year directories directly under the export root, sorted by name.
///
/// Symlinks are not followed; only real directories count.
pub fn find_year_dirs(export_root: &Path) -> Result<Vec<YearDir>> {
    let mut years = Vec::new();

    for entry in fs::read_dir(export_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_year_name(&name) {
            continue;
        }

        let path = entry.path();
        let mut months: Vec<String> = fs::read_dir(&path)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|m| is_month_name(m))
            .collect();
        months.sort();

        years.push(YearDir { name, path, months });
    }

    years.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(years)
}

/// Count year/month directories, files and bytes under the export root.
pub fn collect_stats(export_root: &Path) -> Result<ExportStats> {
    let years = find_year_dirs(export_root)?;
    let mut stats = ExportStats {
        year_dirs: years.len(),
        month_dirs: years.iter().map(|y| y.months.len()).sum(),
        ..Default::default()
    };

    for entry in WalkDir::new(export_root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            stats.total_files += 1;
            stats.total_size += entry.metadata()?.len();
        }
    }

    Ok(stats)
}

/// Log and return export statistics.
pub fn validate_export(export_root: &Path) -> Result<ExportStats> {
    log::debug!("Validating export results...");
    let stats = collect_stats(export_root)?;

    if stats.year_dirs == 0 {
        log::warn!("No year directories found in {}", export_root.display());
    } else {
        log::info!(
            "Found {} year directories ({} months)",
            stats.year_dirs,
            stats.month_dirs
        );
    }

    if stats.total_files == 0 {
        log::warn!("No files found in export (incremental export?)");
    } else {
        log::info!(
            "Total: {} files ({:.1} MB)",
            stats.total_files,
            stats.size_mb()
        );
    }

    Ok(stats)
}
