use crate::export_core::config::CliOverrides;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// OSXPhotos to Nextcloud Export Tool
///
/// Exports photos from Apple Photos.app into {year}/{month} folders and links
/// the year folders into a Nextcloud directory.
///
/// Command line arguments take precedence over configuration file values.
/// Boolean flags accept an explicit value (`--dry-run=false`) to override a
/// value set in the configuration file.
#[derive(Parser, Debug)]
#[command(author, version)]
pub struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Export destination directory
    #[arg(short, long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Nextcloud sync directory
    #[arg(short, long, value_name = "DIR")]
    pub nc_photos_dir: Option<PathBuf>,

    /// Path to log file
    #[arg(short, long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Show what would happen, but don't write or link
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub dry_run: Option<bool>,

    /// Create symlinks into Nextcloud (default)
    #[arg(long, overrides_with = "no_symlink")]
    pub use_symlink: bool,

    /// Do not create symlinks into Nextcloud
    #[arg(long, overrides_with = "use_symlink")]
    pub no_symlink: bool,

    /// Do automated cleanup tasks (orientation, keywords, orphan files, empty directories)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub cleanup: Option<bool>,

    /// Export AAE adjustments files detailing edits made to originals
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub export_aae: Option<bool>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub quiet: Option<bool>,

    /// osxphotos program to run
    #[arg(long, value_name = "PROGRAM")]
    pub osxphotos: Option<String>,
}

impl Cli {
    /// Values the user supplied explicitly on the command line.
    pub fn overrides(&self) -> CliOverrides {
        let use_symlink = if self.no_symlink {
            Some(false)
        } else if self.use_symlink {
            Some(true)
        } else {
            None
        };

        CliOverrides {
            export_dir: self.export_dir.clone(),
            nc_photos_dir: self.nc_photos_dir.clone(),
            log_file: self.log_file.clone(),
            dry_run: self.dry_run,
            use_symlink,
            cleanup: self.cleanup,
            export_aae: self.export_aae,
            verbose: (self.verbose > 0).then_some(self.verbose),
            quiet: self.quiet,
            osxphotos: self.osxphotos.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("export-photos-to-nextcloud").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_absent_flags_are_not_overrides() {
        let overrides = parse(&[]).overrides();
        assert_eq!(overrides, CliOverrides::default());
    }

    #[test]
    fn test_tri_state_flags() {
        let overrides = parse(&["--dry-run", "--cleanup=false", "-q"]).overrides();
        assert_eq!(overrides.dry_run, Some(true));
        assert_eq!(overrides.cleanup, Some(false));
        assert_eq!(overrides.quiet, Some(true));
        assert_eq!(overrides.export_aae, None);
    }

    #[test]
    fn test_symlink_pair_last_wins() {
        assert_eq!(parse(&["--no-symlink"]).overrides().use_symlink, Some(false));
        assert_eq!(
            parse(&["--no-symlink", "--use-symlink"]).overrides().use_symlink,
            Some(true)
        );
        assert_eq!(
            parse(&["--use-symlink", "--no-symlink"]).overrides().use_symlink,
            Some(false)
        );
    }

    #[test]
    fn test_verbose_count_and_short_paths() {
        let cli = parse(&["-vv", "-e", "/tmp/export", "-n", "/tmp/nc", "-l", "/tmp/log.txt"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.verbose, Some(2));
        assert_eq!(overrides.export_dir, Some(PathBuf::from("/tmp/export")));
        assert_eq!(overrides.nc_photos_dir, Some(PathBuf::from("/tmp/nc")));
        assert_eq!(overrides.log_file, Some(PathBuf::from("/tmp/log.txt")));
    }

    #[test]
    fn test_invalid_option_rejected() {
        assert!(Cli::try_parse_from(["export-photos-to-nextcloud", "--invalid-option"]).is_err());
    }
}
