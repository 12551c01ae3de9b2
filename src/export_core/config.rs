//! Configuration loading and merging.
//!
//! Values come from three layers: built-in defaults, an optional YAML file and
//! the command line. Each layer only overrides the keys it actually sets.

use crate::export_core::error::{ExportError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Highest meaningful verbosity level.
pub const MAX_VERBOSITY: u8 = 3;

/// Engine program used when neither the file nor the CLI names one.
pub const DEFAULT_OSXPHOTOS: &str = "osxphotos";

/// The YAML configuration file. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub export_dir: Option<PathBuf>,
    pub nc_photos_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub dry_run: Option<bool>,
    pub use_symlink: Option<bool>,
    pub cleanup: Option<bool>,
    pub export_aae: Option<bool>,
    pub verbose: Option<u8>,
    pub quiet: Option<bool>,
    pub osxphotos: Option<String>,
}

/// Values given explicitly on the command line. `None` means "not given".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CliOverrides {
    pub export_dir: Option<PathBuf>,
    pub nc_photos_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub dry_run: Option<bool>,
    pub use_symlink: Option<bool>,
    pub cleanup: Option<bool>,
    pub export_aae: Option<bool>,
    pub verbose: Option<u8>,
    pub quiet: Option<bool>,
    pub osxphotos: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub export_dir: PathBuf,
    pub nc_photos_dir: PathBuf,
    pub log_file: PathBuf,
    pub dry_run: bool,
    pub use_symlink: bool,
    pub cleanup: bool,
    pub export_aae: bool,
    pub verbose: u8,
    pub quiet: bool,
    pub osxphotos: String,
}

impl FileConfig {
    /// Load a YAML configuration file.
    ///
    /// An empty file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_home(path)?;

        if !path.exists() {
            return Err(ExportError::ConfigNotFound(path));
        }
        if !path.is_file() {
            return Err(ExportError::ConfigNotAFile(path));
        }

        let content = fs::read_to_string(&path)?;
        let config = Self::parse(&content).map_err(|source| ExportError::ConfigParse {
            path: path.clone(),
            source,
        })?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn parse(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        // A document holding only `~` or `null` deserializes as None.
        Ok(serde_yaml::from_str::<Option<Self>>(content)?.unwrap_or_default())
    }
}

impl Settings {
    /// Merge file values and CLI overrides on top of the defaults.
    ///
    /// CLI values win over file values, file values win over defaults. Every
    /// required path that is still missing afterwards is reported at once.
    pub fn resolve(file: FileConfig, cli: CliOverrides) -> Result<Self> {
        let export_dir = non_empty(cli.export_dir).or(non_empty(file.export_dir));
        let nc_photos_dir = non_empty(cli.nc_photos_dir).or(non_empty(file.nc_photos_dir));
        let log_file = non_empty(cli.log_file).or(non_empty(file.log_file));

        let (Some(export_dir), Some(nc_photos_dir), Some(log_file)) =
            (&export_dir, &nc_photos_dir, &log_file)
        else {
            let missing = [
                ("export_dir", export_dir.is_none()),
                ("nc_photos_dir", nc_photos_dir.is_none()),
                ("log_file", log_file.is_none()),
            ]
            .into_iter()
            .filter_map(|(key, is_missing)| is_missing.then_some(key))
            .collect();
            return Err(ExportError::MissingConfig(missing));
        };

        let verbose = cli.verbose.or(file.verbose).unwrap_or(0).min(MAX_VERBOSITY);

        Ok(Settings {
            export_dir: absolutize(export_dir)?,
            nc_photos_dir: absolutize(nc_photos_dir)?,
            log_file: absolutize(log_file)?,
            dry_run: cli.dry_run.or(file.dry_run).unwrap_or(false),
            use_symlink: cli.use_symlink.or(file.use_symlink).unwrap_or(true),
            cleanup: cli.cleanup.or(file.cleanup).unwrap_or(false),
            export_aae: cli.export_aae.or(file.export_aae).unwrap_or(false),
            verbose,
            quiet: cli.quiet.or(file.quiet).unwrap_or(false),
            osxphotos: cli
                .osxphotos
                .or(file.osxphotos)
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OSXPHOTOS.to_string()),
        })
    }

    /// Load the optional configuration file and merge it with the CLI values.
    pub fn from_sources(config_path: Option<&Path>, cli: CliOverrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, cli)
    }
}

fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let home = dirs::home_dir().ok_or_else(|| ExportError::HomeDirUnknown(path.into()))?;
            Ok(home.join(components.as_path()))
        }
        _ => Ok(path.to_path_buf()),
    }
}

/// Expand `~` and make the path absolute against the current directory.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path)?;
    Ok(std::path::absolute(expanded)?)
}
