use crate::export_core::error::{ItemFailures, Result};
use crate::export_core::tree::{is_month_name, is_year_name};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub files_removed: Vec<PathBuf>,
    pub dirs_removed: Vec<PathBuf>,
    pub dry_run: bool,
    pub failures: ItemFailures,
}

/// Removes orphan files and empty directories from the export root.
pub struct Cleanup<'a> {
    export_root: &'a Path,
    export_aae: bool,
    dry_run: bool,
    /// Paths under the export root that belong to this tool, such as its log file.
    protected: Vec<PathBuf>,
}

/// Whether any component of a path relative to the export root is hidden.
fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_str().map(|n| n.starts_with('.')).unwrap_or(false),
        _ => false,
    })
}

fn is_aae(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("aae"))
        .unwrap_or(false)
}

/// Whether a path relative to the export root lies inside a `{year}/{month}` directory.
fn in_year_month(relative: &Path) -> bool {
    let names: Vec<&str> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();
    names.len() >= 3 && is_year_name(names[0]) && is_month_name(names[1])
}

impl<'a> Cleanup<'a> {
    pub fn new(export_root: &'a Path, export_aae: bool, dry_run: bool) -> Self {
        Self {
            export_root,
            export_aae,
            dry_run,
            protected: Vec::new(),
        }
    }

    /// Never remove `path` or anything below it.
    pub fn protect(mut self, path: impl Into<PathBuf>) -> Self {
        self.protected.push(path.into());
        self
    }

    fn is_protected(&self, path: &Path) -> bool {
        self.protected.iter().any(|p| path.starts_with(p))
    }

    /// Files that are not part of the current export selection.
    ///
    /// Hidden files, such as the osxphotos export database, are never orphans.
    pub fn is_orphan(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(self.export_root) else {
            return false;
        };
        if is_hidden(relative) || self.is_protected(path) {
            return false;
        }
        if !in_year_month(relative) {
            return true;
        }
        !self.export_aae && is_aae(path)
    }

    pub fn run(&self) -> Result<CleanupReport> {
        let mut report = CleanupReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        if !self.export_root.is_dir() {
            log::warn!(
                "Export directory {} does not exist, nothing to clean up",
                self.export_root.display()
            );
            return Ok(report);
        }

        log::info!("Cleaning up {}...", self.export_root.display());
        let prefix = if self.dry_run { "[DRY RUN] Would remove" } else { "Removed" };

        // Paths already gone, or that would be gone in a dry run.
        let mut removed: HashSet<PathBuf> = HashSet::new();

        // Children come before their directory; filter_entry cannot prune in this order.
        let walker = WalkDir::new(self.export_root).contents_first(true);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    log::error!("Cannot read {}: {}", path.display(), e);
                    report.failures.add(path, e.to_string());
                    continue;
                }
            };
            let path = entry.path();
            if path
                .strip_prefix(self.export_root)
                .map(is_hidden)
                .unwrap_or(true)
                || self.is_protected(path)
            {
                continue;
            }

            if entry.file_type().is_file() {
                if !self.is_orphan(path) {
                    continue;
                }
                match self.remove(path, |p| fs::remove_file(p)) {
                    Ok(()) => {
                        log::info!("{} orphan file {}", prefix, path.display());
                        removed.insert(path.to_path_buf());
                        report.files_removed.push(path.to_path_buf());
                    }
                    Err(e) => {
                        log::error!("Failed to remove {}: {}", path.display(), e);
                        report.failures.add(path.to_path_buf(), e.to_string());
                    }
                }
            } else if entry.file_type().is_dir() && entry.depth() > 0 {
                match self.is_empty(path, &removed) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        // Unreadable directories were already reported by the walker.
                        if !report.failures.iter().any(|f| f.path.as_path() == path) {
                            log::error!("Cannot read {}: {}", path.display(), e);
                            report.failures.add(path.to_path_buf(), e.to_string());
                        }
                        continue;
                    }
                }
                match self.remove(path, |p| fs::remove_dir(p)) {
                    Ok(()) => {
                        log::info!("{} empty directory {}", prefix, path.display());
                        removed.insert(path.to_path_buf());
                        report.dirs_removed.push(path.to_path_buf());
                    }
                    Err(e) => {
                        log::error!("Failed to remove {}: {}", path.display(), e);
                        report.failures.add(path.to_path_buf(), e.to_string());
                    }
                }
            }
        }

        log::info!(
            "{}Cleanup: {} files, {} empty directories removed",
            if self.dry_run { "[DRY RUN] " } else { "" },
            report.files_removed.len(),
            report.dirs_removed.len()
        );

        Ok(report)
    }

    fn remove(&self, path: &Path, op: fn(&Path) -> std::io::Result<()>) -> std::io::Result<()> {
        if self.dry_run { Ok(()) } else { op(path) }
    }

    /// A directory is empty once every entry in it has been removed.
    fn is_empty(&self, dir: &Path, removed: &HashSet<PathBuf>) -> std::io::Result<bool> {
        for entry in fs::read_dir(dir)? {
            if !removed.contains(&entry?.path()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    fn populated() -> assert_fs::TempDir {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        temp_dir.child("2024/01/IMG_0001.jpg").touch().unwrap();
        temp_dir.child("2024/01/IMG_0001.AAE").touch().unwrap();
        temp_dir.child("2024/02").create_dir_all().unwrap();
        temp_dir.child("2023/12/empty/nested").create_dir_all().unwrap();
        temp_dir.child("2023/12/IMG_0002.heic").touch().unwrap();
        temp_dir.child("stray.txt").touch().unwrap();
        temp_dir.child("2024/loose.jpg").touch().unwrap();
        temp_dir.child(".osxphotos_export.db").touch().unwrap();
        temp_dir.child(".cache/empty").create_dir_all().unwrap();
        temp_dir
    }

    #[test]
    fn test_is_orphan() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let root = temp_dir.path();
        let cleanup = Cleanup::new(root, false, true);
        assert!(!cleanup.is_orphan(&root.join("2024/01/IMG_0001.jpg")));
        assert!(cleanup.is_orphan(&root.join("2024/01/IMG_0001.aae")));
        assert!(cleanup.is_orphan(&root.join("stray.txt")));
        assert!(cleanup.is_orphan(&root.join("2024/loose.jpg")));
        assert!(cleanup.is_orphan(&root.join("Albums/01/x.jpg")));
        assert!(!cleanup.is_orphan(Path::new("/elsewhere/stray.txt")));
        assert!(!cleanup.is_orphan(&root.join(".osxphotos_export.db")));

        let keep_aae = Cleanup::new(root, true, true);
        assert!(!keep_aae.is_orphan(&root.join("2024/01/IMG_0001.AAE")));
    }

    #[test]
    fn test_cleanup_removes_orphans_and_empty_dirs() {
        let temp_dir = populated();
        let report = Cleanup::new(temp_dir.path(), false, false).run().unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.files_removed.len(), 3);
        assert_eq!(report.dirs_removed.len(), 3);

        temp_dir.child("2024/01/IMG_0001.jpg").assert(predicate::path::exists());
        temp_dir.child("2023/12/IMG_0002.heic").assert(predicate::path::exists());
        temp_dir.child("2024/01/IMG_0001.AAE").assert(predicate::path::missing());
        temp_dir.child("stray.txt").assert(predicate::path::missing());
        temp_dir.child("2024/loose.jpg").assert(predicate::path::missing());
        temp_dir.child("2024/02").assert(predicate::path::missing());
        temp_dir.child("2023/12/empty").assert(predicate::path::missing());
        temp_dir.child(".osxphotos_export.db").assert(predicate::path::exists());
        temp_dir.child(".cache/empty").assert(predicate::path::exists());
        temp_dir.assert(predicate::path::is_dir());
    }

    #[test]
    fn test_directory_emptied_by_cleanup_is_removed() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        temp_dir.child("Albums/trip.jpg").touch().unwrap();

        let report = Cleanup::new(temp_dir.path(), false, false).run().unwrap();
        assert_eq!(report.files_removed.len(), 1);
        assert_eq!(report.dirs_removed, vec![temp_dir.path().join("Albums")]);
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let temp_dir = populated();
        let report = Cleanup::new(temp_dir.path(), false, true).run().unwrap();

        assert_eq!(report.files_removed.len(), 3);
        assert_eq!(report.dirs_removed.len(), 3);
        temp_dir.child("stray.txt").assert(predicate::path::exists());
        temp_dir.child("2024/01/IMG_0001.AAE").assert(predicate::path::exists());
        temp_dir.child("2024/02").assert(predicate::path::is_dir());
        temp_dir.child("2023/12/empty/nested").assert(predicate::path::is_dir());
    }

    #[test]
    fn test_non_empty_in_scope_dirs_kept() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        temp_dir.child("2022/06/IMG_0100.jpg").touch().unwrap();
        temp_dir.child("2022/07/IMG_0101.mov").touch().unwrap();

        let report = Cleanup::new(temp_dir.path(), false, false).run().unwrap();
        assert!(report.files_removed.is_empty());
        assert!(report.dirs_removed.is_empty());
        temp_dir.child("2022/06/IMG_0100.jpg").assert(predicate::path::exists());
        temp_dir.child("2022/07/IMG_0101.mov").assert(predicate::path::exists());
    }

    #[test]
    fn test_protected_log_files_kept() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        temp_dir.child("export.log").touch().unwrap();
        temp_dir.child("export.log.1").touch().unwrap();
        temp_dir.child("stray.txt").touch().unwrap();
        let log = temp_dir.path().join("export.log");

        let cleanup = Cleanup::new(temp_dir.path(), false, false)
            .protect(&log)
            .protect(temp_dir.path().join("export.log.1"));
        assert!(!cleanup.is_orphan(&log));

        let report = cleanup.run().unwrap();
        assert_eq!(report.files_removed, vec![temp_dir.path().join("stray.txt")]);
        temp_dir.child("export.log").assert(predicate::path::exists());
        temp_dir.child("export.log.1").assert(predicate::path::exists());
    }

    #[test]
    fn test_nested_nextcloud_dir_kept() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        temp_dir.child("2024/01/IMG_0001.jpg").touch().unwrap();
        temp_dir.child("nextcloud/notes.txt").touch().unwrap();
        temp_dir.child("nextcloud/empty").create_dir_all().unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            temp_dir.path().join("2024"),
            temp_dir.path().join("nextcloud/2024"),
        )
        .unwrap();

        let report = Cleanup::new(temp_dir.path(), false, false)
            .protect(temp_dir.path().join("nextcloud"))
            .run()
            .unwrap();

        assert!(report.files_removed.is_empty());
        assert!(report.dirs_removed.is_empty());
        temp_dir.child("nextcloud/notes.txt").assert(predicate::path::exists());
        temp_dir.child("nextcloud/empty").assert(predicate::path::is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_item_failure() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = assert_fs::TempDir::new().unwrap();
        temp_dir.child("2024/01/IMG_0001.jpg").touch().unwrap();
        temp_dir.child("2024/02/locked").create_dir_all().unwrap();
        temp_dir.child("stray.txt").touch().unwrap();
        let locked = temp_dir.path().join("2024/02/locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permissions do not apply to root.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = Cleanup::new(temp_dir.path(), false, false).run();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let report = result.unwrap();
        assert!(!report.failures.is_empty());
        assert!(report.failures.iter().any(|f| f.path == locked));
        temp_dir.child("stray.txt").assert(predicate::path::missing());
        temp_dir.child("2024/01/IMG_0001.jpg").assert(predicate::path::exists());
        temp_dir.child("2024/02/locked").assert(predicate::path::is_dir());
    }
}
