pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod osxphotos;
pub mod report;
pub mod run;
pub mod shutdown;
pub mod symlinks;
pub mod tree;

pub use cleanup::{Cleanup, CleanupReport};
pub use cli::Cli;
pub use config::{CliOverrides, FileConfig, Settings};
pub use error::ExportError;
pub use osxphotos::{ExportSummary, Osxphotos};
pub use report::RunSummary;
pub use run::run;
pub use symlinks::{LinkAction, SymlinkSync, SyncReport};
pub use tree::{ExportStats, YearDir};
