use crate::export_core::error::{ItemFailures, Result};
use crate::export_core::tree::{YearDir, find_year_dirs, is_year_name};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What needs to happen to one link in the Nextcloud directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// No entry with the year's name exists yet.
    Create { link: PathBuf, target: PathBuf },
    /// A symlink exists but points somewhere else.
    Replace {
        link: PathBuf,
        target: PathBuf,
        previous: PathBuf,
    },
    /// A year link whose year directory is gone.
    Remove { link: PathBuf, previous: PathBuf },
    /// Already correct.
    Keep { link: PathBuf },
    /// A regular file or directory is in the way.
    Blocked { link: PathBuf },
    /// An entry in the Nextcloud directory could not be inspected.
    Unreadable { link: PathBuf, reason: String },
}

/// Outcome of one synchronization pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub skipped: bool,
    pub dry_run: bool,
    pub failures: ItemFailures,
}

impl SyncReport {
    /// Number of file-system changes made (or, in dry-run, that would be made).
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.removed
    }

    /// Fold in the changes of a later pass over the same directories.
    pub fn absorb(&mut self, later: SyncReport) {
        self.created += later.created;
        self.updated += later.updated;
        self.removed += later.removed;
        self.failures.extend(later.failures);
    }
}

/// Keeps one symlink per export year directory in the Nextcloud directory.
pub struct SymlinkSync<'a> {
    export_root: &'a Path,
    nc_root: &'a Path,
    dry_run: bool,
}

impl<'a> SymlinkSync<'a> {
    pub fn new(export_root: &'a Path, nc_root: &'a Path, dry_run: bool) -> Self {
        Self {
            export_root,
            nc_root,
            dry_run,
        }
    }

    /// Work out the action for every year directory and every stale year link.
    pub fn plan(&self) -> Result<Vec<LinkAction>> {
        let years = find_year_dirs(self.export_root)?;
        let mut actions: Vec<LinkAction> = years.iter().map(|year| self.plan_year(year)).collect();

        let existing = match fs::read_dir(self.nc_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(actions),
            Err(e) => return Err(e.into()),
        };

        let mut stale = Vec::new();
        for entry in existing {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    stale.push(unreadable(self.nc_root.to_path_buf(), &e));
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_year_name(name) || years.iter().any(|y| y.name == name) {
                continue;
            }

            let link = entry.path();
            match entry.file_type() {
                Ok(file_type) if !file_type.is_symlink() => continue,
                Ok(_) => {}
                Err(e) => {
                    stale.push(unreadable(link, &e));
                    continue;
                }
            }
            match fs::read_link(&link) {
                Ok(previous) if self.is_stale(&link, &previous) => {
                    stale.push(LinkAction::Remove { link, previous })
                }
                Ok(_) => {}
                Err(e) => stale.push(unreadable(link, &e)),
            }
        }
        stale.sort_by(|a, b| link_of(a).cmp(link_of(b)));
        actions.extend(stale);

        Ok(actions)
    }

    fn plan_year(&self, year: &YearDir) -> LinkAction {
        let link = self.nc_root.join(&year.name);
        let target = year.path.clone();

        match fs::symlink_metadata(&link) {
            Err(_) => LinkAction::Create { link, target },
            Ok(meta) if meta.file_type().is_symlink() => match fs::read_link(&link) {
                Ok(previous) if same_target(&link, &previous, &target) => LinkAction::Keep { link },
                Ok(previous) => LinkAction::Replace {
                    link,
                    target,
                    previous,
                },
                Err(_) => LinkAction::Replace {
                    link,
                    target,
                    previous: PathBuf::new(),
                },
            },
            Ok(_) => LinkAction::Blocked { link },
        }
    }

    /// A year link is stale when it dangles or points into the export root.
    /// Links the user pointed elsewhere are left alone.
    fn is_stale(&self, link: &Path, previous: &Path) -> bool {
        let resolved = resolve_link_target(link, previous);
        if !resolved.exists() {
            return true;
        }
        let root = fs::canonicalize(self.export_root).unwrap_or_else(|_| self.export_root.to_path_buf());
        let resolved = fs::canonicalize(&resolved).unwrap_or(resolved);
        resolved.starts_with(&root)
    }

    /// Plan and apply. Per-link failures are recorded and the pass continues.
    pub fn run(&self) -> Result<SyncReport> {
        let mut report = SyncReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        if !self.export_root.is_dir() {
            log::warn!(
                "Export directory {} does not exist, no year directories to link",
                self.export_root.display()
            );
            return Ok(report);
        }

        let actions = self.plan()?;
        if actions.is_empty() {
            log::warn!("No year directories to link");
            return Ok(report);
        }

        log::info!("Creating symlinks to Nextcloud...");
        for action in actions {
            self.apply(action, &mut report);
        }

        if !report.failures.is_empty() {
            log::warn!("Symlinks completed with {} errors", report.failures.len());
        } else if report.changes() == 0 {
            log::info!("All {} symlinks already up to date", report.unchanged);
        } else {
            log::info!(
                "{}Symlinks: {} created, {} updated, {} removed, {} unchanged",
                if self.dry_run { "[DRY RUN] " } else { "" },
                report.created,
                report.updated,
                report.removed,
                report.unchanged
            );
        }

        Ok(report)
    }

    fn apply(&self, action: LinkAction, report: &mut SyncReport) {
        match action {
            LinkAction::Keep { link } => {
                log::trace!("Up to date: {}", link.display());
                report.unchanged += 1;
            }
            LinkAction::Blocked { link } => {
                log::warn!("Target exists and is not a symlink: {}", link.display());
                report.failures.add(link, "exists and is not a symlink");
            }
            LinkAction::Unreadable { link, reason } => {
                log::error!("Cannot inspect {}: {}", link.display(), reason);
                report.failures.add(link, reason);
            }
            LinkAction::Create { link, target } => {
                if self.dry_run {
                    log::info!("[DRY RUN] Would link {} -> {}", link.display(), target.display());
                    report.created += 1;
                    return;
                }
                match create_link(&target, &link) {
                    Ok(()) => {
                        log::debug!("Linked: {} -> {}", link.display(), target.display());
                        report.created += 1;
                    }
                    Err(e) => {
                        log::error!("Failed to link {}: {}", link.display(), e);
                        report.failures.add(link, e.to_string());
                    }
                }
            }
            LinkAction::Replace {
                link,
                target,
                previous,
            } => {
                if self.dry_run {
                    log::info!(
                        "[DRY RUN] Would relink {} -> {} (was {})",
                        link.display(),
                        target.display(),
                        previous.display()
                    );
                    report.updated += 1;
                    return;
                }
                match remove_link(&link).and_then(|()| create_link(&target, &link)) {
                    Ok(()) => {
                        log::debug!(
                            "Relinked: {} -> {} (was {})",
                            link.display(),
                            target.display(),
                            previous.display()
                        );
                        report.updated += 1;
                    }
                    Err(e) => {
                        log::error!("Failed to relink {}: {}", link.display(), e);
                        report.failures.add(link, e.to_string());
                    }
                }
            }
            LinkAction::Remove { link, previous } => {
                if self.dry_run {
                    log::info!(
                        "[DRY RUN] Would remove stale link {} -> {}",
                        link.display(),
                        previous.display()
                    );
                    report.removed += 1;
                    return;
                }
                match remove_link(&link) {
                    Ok(()) => {
                        log::debug!("Removed stale link: {} -> {}", link.display(), previous.display());
                        report.removed += 1;
                    }
                    Err(e) => {
                        log::error!("Failed to remove stale link {}: {}", link.display(), e);
                        report.failures.add(link, e.to_string());
                    }
                }
            }
        }
    }
}

fn unreadable(link: PathBuf, error: &io::Error) -> LinkAction {
    LinkAction::Unreadable {
        link,
        reason: error.to_string(),
    }
}

fn link_of(action: &LinkAction) -> &Path {
    match action {
        LinkAction::Create { link, .. }
        | LinkAction::Replace { link, .. }
        | LinkAction::Remove { link, .. }
        | LinkAction::Keep { link }
        | LinkAction::Blocked { link }
        | LinkAction::Unreadable { link, .. } => link,
    }
}

/// Relative link targets are relative to the directory holding the link.
fn resolve_link_target(link: &Path, target: &Path) -> PathBuf {
    match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target.to_path_buf(),
    }
}

fn same_target(link: &Path, previous: &Path, target: &Path) -> bool {
    if previous == target {
        return true;
    }
    let resolved = resolve_link_target(link, previous);
    match (fs::canonicalize(resolved), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_file(link)
}

#[cfg(windows)]
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_dir(link)
}
