use crate::export_core::config::Settings;
use crate::export_core::error::{ExportError, Result};
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Log files larger than this are rotated before a run starts.
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated logs kept next to the active one, `<name>.1` being the newest.
pub const LOG_GENERATIONS: usize = 7;

/// Console and file levels for the given verbosity.
pub fn levels(verbose: u8, quiet: bool) -> (LevelFilter, LevelFilter) {
    if quiet {
        return (LevelFilter::Warn, LevelFilter::Info);
    }
    match verbose {
        0 => (LevelFilter::Info, LevelFilter::Debug),
        1 => (LevelFilter::Debug, LevelFilter::Trace),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    }
}

/// Install the console logger and the appending file logger.
pub fn init(settings: &Settings) -> Result<()> {
    let (console_level, file_level) = levels(settings.verbose, settings.quiet);

    rotate_if_large(&settings.log_file, MAX_LOG_SIZE, LOG_GENERATIONS)?;
    let file = open_log_file(&settings.log_file)?;

    let file_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Debug)
        .build();

    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(
            console_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(file_level, file_config, file),
    ];

    CombinedLogger::init(loggers)?;
    log::info!("Logging configured");
    Ok(())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ExportError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ExportError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Path of the `generation`-th rotated copy of a log file.
pub fn rotated_path(path: &Path, generation: usize) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}", generation));
    path.with_file_name(name)
}

/// The active log file and every rotated copy of it.
pub fn log_files(path: &Path, generations: usize) -> Vec<PathBuf> {
    std::iter::once(path.to_path_buf())
        .chain((1..=generations).map(|g| rotated_path(path, g)))
        .collect()
}

/// Move an oversized log file to `<name>.1`, shifting older copies up and
/// dropping the one past `generations`.
pub fn rotate_if_large(path: &Path, max_size: u64, generations: usize) -> Result<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size <= max_size || generations == 0 {
        return Ok(false);
    }

    let log_err = |source| ExportError::LogFile {
        path: path.to_path_buf(),
        source,
    };

    let oldest = rotated_path(path, generations);
    if oldest.exists() {
        fs::remove_file(&oldest).map_err(log_err)?;
    }
    for generation in (1..generations).rev() {
        let from = rotated_path(path, generation);
        if from.exists() {
            fs::rename(&from, rotated_path(path, generation + 1)).map_err(log_err)?;
        }
    }
    fs::rename(path, rotated_path(path, 1)).map_err(log_err)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_levels() {
        assert_eq!(levels(3, true), (LevelFilter::Warn, LevelFilter::Info));
        assert_eq!(levels(0, false), (LevelFilter::Info, LevelFilter::Debug));
        assert_eq!(levels(1, false), (LevelFilter::Debug, LevelFilter::Trace));
        assert_eq!(levels(2, false), (LevelFilter::Trace, LevelFilter::Trace));
        assert_eq!(levels(3, false), (LevelFilter::Trace, LevelFilter::Trace));
    }

    #[test]
    fn test_rotated_path() {
        assert_eq!(
            rotated_path(Path::new("/var/log/export.log"), 1),
            PathBuf::from("/var/log/export.log.1")
        );
        assert_eq!(
            log_files(Path::new("/var/log/export.log"), 2),
            vec![
                PathBuf::from("/var/log/export.log"),
                PathBuf::from("/var/log/export.log.1"),
                PathBuf::from("/var/log/export.log.2"),
            ]
        );
    }

    #[test]
    fn test_rotate_if_large() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let log = temp_dir.child("export.log");

        assert!(!rotate_if_large(log.path(), 8, 3).unwrap());

        log.write_str("short").unwrap();
        assert!(!rotate_if_large(log.path(), 8, 3).unwrap());
        log.assert("short");

        log.write_str("much longer than eight bytes").unwrap();
        assert!(rotate_if_large(log.path(), 8, 3).unwrap());
        log.assert(predicates::path::missing());
        temp_dir
            .child("export.log.1")
            .assert("much longer than eight bytes");
    }

    #[test]
    fn test_rotation_keeps_generations() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let log = temp_dir.child("export.log");

        for run in ["first run log", "second run log", "third run log", "fourth run log"] {
            log.write_str(run).unwrap();
            assert!(rotate_if_large(log.path(), 4, 2).unwrap());
        }

        temp_dir.child("export.log.1").assert("fourth run log");
        temp_dir.child("export.log.2").assert("third run log");
        temp_dir
            .child("export.log.3")
            .assert(predicates::path::missing());
    }

    #[test]
    fn test_open_log_file_creates_parent() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let log = temp_dir.child("logs/nested/export.log");
        open_log_file(log.path()).unwrap();
        log.assert(predicates::path::exists());
    }
}
