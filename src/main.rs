use anyhow::{Context, Result};
use clap::Parser;
use export_photos_to_nextcloud::export_core::{Cli, ExportError, Settings, logging, run, shutdown};
use std::process::ExitCode;

/// Exit code for runs that finished with some symlink or cleanup failures.
const PARTIAL_FAILURE: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Nothing is logged or run until the configuration is complete.
    let settings = Settings::from_sources(cli.config.as_deref(), cli.overrides()).context(
        "Invalid configuration. Values can be provided via command line arguments or configuration file",
    )?;

    logging::init(&settings)?;
    shutdown::install()?;

    match run(&settings) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(ExportError::Partial(failures)) => {
            log::error!("Completed with {} failed items, see the log for details", failures.len());
            Ok(ExitCode::from(PARTIAL_FAILURE))
        }
        Err(e) => {
            log::error!("{}", e);
            Err(e.into())
        }
    }
}
