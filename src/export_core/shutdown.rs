use crate::export_core::error::{ExportError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

static REQUESTED: AtomicBool = AtomicBool::new(false);

/// Exit code used when a second signal forces the process down.
const FORCED_EXIT: i32 = 130;

/// Install the SIGINT/SIGTERM handler.
///
/// The first signal asks the run to stop: a running osxphotos export is
/// killed and no later step starts. A second signal exits immediately.
pub fn install() -> Result<()> {
    ctrlc::set_handler(|| {
        if REQUESTED.swap(true, Ordering::SeqCst) {
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(FORCED_EXIT);
        }
        eprintln!("\nShutdown requested. Stopping osxphotos... (send again to force quit)");
    })?;
    Ok(())
}

pub fn requested() -> bool {
    REQUESTED.load(Ordering::SeqCst)
}

/// Fail with [`ExportError::Interrupted`] once a shutdown was requested.
pub fn check() -> Result<()> {
    if requested() {
        log::warn!("Run interrupted, remaining steps skipped");
        return Err(ExportError::Interrupted);
    }
    Ok(())
}
