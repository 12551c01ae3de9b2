use crate::export_core::cleanup::Cleanup;
use crate::export_core::config::Settings;
use crate::export_core::error::{ExportError, ItemFailures, Result};
use crate::export_core::logging::{LOG_GENERATIONS, log_files};
use crate::export_core::osxphotos::Osxphotos;
use crate::export_core::report::{RunSummary, generate_report, print_banner};
use crate::export_core::shutdown;
use crate::export_core::symlinks::{SymlinkSync, SyncReport};
use crate::export_core::tree::validate_export;
use std::fs;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Create the export and Nextcloud roots. Dry runs only log.
pub fn setup_directories(settings: &Settings) -> Result<()> {
    log::debug!("Setting up directories...");

    for dir in [&settings.export_dir, &settings.nc_photos_dir] {
        if settings.dry_run {
            if !dir.is_dir() {
                log::info!("[DRY RUN] Would create: {}", dir.display());
            }
            continue;
        }
        fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        log::debug!("Created/verified directory: {}", dir.display());
    }

    Ok(())
}

/// Synchronize the Nextcloud year links, unless disabled.
pub fn manage_symlinks(settings: &Settings) -> Result<SyncReport> {
    if !settings.use_symlink {
        log::info!("Symlink step skipped");
        return Ok(SyncReport {
            skipped: true,
            dry_run: settings.dry_run,
            ..Default::default()
        });
    }
    SymlinkSync::new(&settings.export_dir, &settings.nc_photos_dir, settings.dry_run).run()
}

/// Cleanup for the export root that leaves this tool's own files alone.
pub fn cleanup_for(settings: &Settings) -> Cleanup<'_> {
    log_files(&settings.log_file, LOG_GENERATIONS)
        .into_iter()
        .fold(
            Cleanup::new(&settings.export_dir, settings.export_aae, settings.dry_run),
            |cleanup, path| cleanup.protect(path),
        )
        .protect(&settings.nc_photos_dir)
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown time".to_string())
}

/// Export, link, clean up and report.
///
/// Dependency, directory and export failures abort the run. Per-item symlink
/// and cleanup failures are collected and returned as [`ExportError::Partial`]
/// once the report has been printed.
pub fn run(settings: &Settings) -> Result<RunSummary> {
    print_banner(settings);
    log::info!("Starting photo export and sync process at {}", timestamp());
    log::debug!("Settings: {:?}", settings);

    let engine = Osxphotos::new(settings.osxphotos.clone());
    engine.check()?;
    setup_directories(settings)?;

    let mut summary = RunSummary {
        export: engine.export(settings)?,
        ..Default::default()
    };
    shutdown::check()?;

    if settings.dry_run {
        log::info!("[DRY RUN] Skipping export validation");
    } else {
        summary.stats = match validate_export(&settings.export_dir) {
            Ok(stats) => Some(stats),
            Err(e) => {
                log::error!("Error validating export: {}", e);
                None
            }
        };
    }

    summary.symlinks = Some(manage_symlinks(settings)?);
    shutdown::check()?;

    if settings.cleanup {
        let report = cleanup_for(settings).run()?;

        // Year directories removed by the cleanup leave dangling links behind.
        if !settings.dry_run && settings.use_symlink && !report.dirs_removed.is_empty() {
            let resync = manage_symlinks(settings)?;
            if let Some(sync) = summary.symlinks.as_mut() {
                sync.absorb(resync);
            }
        }
        summary.cleanup = Some(report);
    }

    generate_report(settings, &summary);

    if summary.failure_count() > 0 {
        let mut failures = ItemFailures::new();
        if let Some(sync) = summary.symlinks.as_mut() {
            failures.extend(std::mem::take(&mut sync.failures));
        }
        if let Some(cleanup) = summary.cleanup.as_mut() {
            failures.extend(std::mem::take(&mut cleanup.failures));
        }
        for failure in failures.iter() {
            log::warn!("Failed: {}: {}", failure.path.display(), failure.reason);
        }
        log::warn!("Finished at {} with {} failed items", timestamp(), failures.len());
        return Err(ExportError::Partial(failures));
    }

    log::info!("All operations completed successfully at {}", timestamp());
    if !settings.quiet {
        println!("\nPhoto export and sync completed successfully!");
    }
    Ok(summary)
}
