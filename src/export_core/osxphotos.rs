use crate::export_core::config::Settings;
use crate::export_core::error::{ExportError, Result};
use crate::export_core::shutdown;
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

/// How often the supervisor polls the engine for exit or shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Directory layout requested from osxphotos.
pub const DIRECTORY_TEMPLATE: &str = "{created.year}/{created.month:02d}";

/// Filename template requested from osxphotos.
pub const FILENAME_TEMPLATE: &str = "IMG_{edited_version?E,}{id:04d}";

/// Counts reported on the final "Processed: ..." line of an osxphotos export.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub processed: Option<u64>,
    pub exported: u64,
    pub updated: u64,
    pub skipped: u64,
    pub missing: u64,
    pub errors: u64,
    /// Whether a summary line was seen at all.
    pub reported: bool,
    /// Lines of output produced by the engine.
    pub output_lines: u64,
}

impl ExportSummary {
    /// Parse a summary line such as
    /// `Processed: 10 photos, exported: 5, updated: 0, skipped: 5, missing: 0, error: 0`.
    ///
    /// Returns `None` for any other line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with("Processed:") {
            return None;
        }

        let mut summary = ExportSummary {
            reported: true,
            ..Default::default()
        };

        // Fields are separated by ", "; counts may carry thousands separators.
        for part in line.split(", ") {
            let Some((key, value)) = part.split_once(':') else {
                continue;
            };
            let Some(count) = value
                .split_whitespace()
                .next()
                .and_then(|n| n.replace(',', "").parse::<u64>().ok())
            else {
                continue;
            };
            match key.trim() {
                "Processed" => summary.processed = Some(count),
                "exported" => summary.exported = count,
                "updated" => summary.updated = count,
                "skipped" => summary.skipped = count,
                "missing" => summary.missing = count,
                "error" | "errors" => summary.errors = count,
                _ => {}
            }
        }

        Some(summary)
    }
}

/// Handle on the osxphotos command-line program.
#[derive(Debug, Clone)]
pub struct Osxphotos {
    program: String,
}

impl Osxphotos {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that the program can be found at all.
    pub fn available(&self) -> bool {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    }

    /// Verify the installation and return the reported version.
    pub fn check(&self) -> Result<String> {
        log::debug!("Checking dependencies...");

        if !self.available() {
            return Err(ExportError::EngineNotFound(self.program.clone()));
        }

        let output = Command::new(&self.program)
            .arg("version")
            .output()
            .map_err(|e| ExportError::EngineBroken {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ExportError::EngineBroken {
                program: self.program.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout
            .split_whitespace()
            .last()
            .unwrap_or("unknown")
            .to_string();
        log::info!("{} version {}", self.program, version);
        Ok(version)
    }

    /// Run the export and stream its output into the log.
    ///
    /// A non-zero exit status is an error.
    pub fn export(&self, settings: &Settings) -> Result<ExportSummary> {
        log::info!("Starting photo export...");

        let args = build_export_args(settings);
        let command_line = display_command(&self.program, &args);
        log::debug!("Export command: {}", command_line);

        if !settings.quiet {
            println!("Export command: {}", command_line);
        }

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExportError::EngineNotFound(self.program.clone()),
                _ => ExportError::Io(e),
            })?;

        let stderr_logger = child
            .stderr
            .take()
            .map(|stderr| thread::spawn(move || log_lines(stderr)));
        let stdout = child.stdout.take();
        let supervisor = thread::spawn(move || supervise(child, shutdown::requested));

        let spinner = export_spinner(settings);

        let mut summary = ExportSummary::default();
        if let Some(stdout) = stdout {
            let read = for_each_line(stdout, |line| {
                log::debug!("osxphotos: {}", line);
                summary.output_lines += 1;
                spinner.inc(1);
                if let Some(parsed) = ExportSummary::parse_line(line) {
                    summary = ExportSummary {
                        output_lines: summary.output_lines,
                        ..parsed
                    };
                }
            });
            if let Err(e) = read {
                log::warn!("Stopped reading osxphotos output: {}", e);
            }
        }

        let status = supervisor
            .join()
            .map_err(|_| io::Error::other("osxphotos supervisor thread panicked"))??;
        if let Some(handle) = stderr_logger {
            summary.output_lines += handle.join().unwrap_or(0);
        }
        spinner.finish_and_clear();

        match status.code() {
            Some(0) => {
                log::info!("Export completed successfully");
                Ok(summary)
            }
            Some(code) => {
                log::error!("Export failed with return code {}", code);
                Err(ExportError::ExportFailed(code))
            }
            None => {
                log::error!("Export process was terminated by a signal");
                Err(ExportError::ExportKilled)
            }
        }
    }
}

/// Spinner shown while the engine runs. Console debug lines would tear
/// through it, so it stays hidden when verbose.
fn export_spinner(settings: &Settings) -> ProgressBar {
    if settings.quiet || settings.verbose > 0 {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} [{elapsed_precise}] Exporting photos... {pos} lines {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Wait for the engine to exit, killing it once `stop` reports a shutdown.
fn supervise(mut child: Child, stop: impl Fn() -> bool) -> io::Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if stop() {
            log::warn!("Terminating osxphotos (pid {})", child.id());
            // The engine may exit on its own between the poll and the kill.
            if let Err(e) = child.kill() {
                log::debug!("Kill failed: {}", e);
            }
            return child.wait();
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Call `f` with every trimmed, non-empty line. Invalid UTF-8 is replaced.
fn for_each_line(reader: impl Read, mut f: impl FnMut(&str)) -> io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if !line.is_empty() {
            f(line);
        }
    }
}

fn log_lines(reader: impl Read) -> u64 {
    let mut count = 0;
    let read = for_each_line(reader, |line| {
        log::debug!("osxphotos: {}", line);
        count += 1;
    });
    if let Err(e) = read {
        log::warn!("Stopped reading osxphotos errors: {}", e);
    }
    count
}

/// Build the argument list for `osxphotos export`.
pub fn build_export_args(settings: &Settings) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["export".into(), settings.export_dir.clone().into()];
    args.extend(
        [
            "--skip-original-if-edited",
            "--directory",
            DIRECTORY_TEMPLATE,
            "--update",
            "--verbose",
            "--download-missing",
            "--use-photokit",
            "--exiftool",
            "--retry",
            "3",
            "--filename",
            FILENAME_TEMPLATE,
            "--edited-suffix",
            "",
            "--strip",
            "--ramdb",
            "--exiftool-option",
            "-m",
            "--exiftool-option",
            "-fast10",
        ]
        .map(OsString::from),
    );

    if settings.verbose == 0 {
        args.extend(["--exiftool-option", "-q"].map(OsString::from));
    }

    if settings.cleanup {
        args.extend(
            [
                "--fix-orientation",
                "--exiftool-merge-keywords",
                "--exiftool-merge-persons",
                "--cleanup",
            ]
            .map(OsString::from),
        );
    }

    if settings.export_aae {
        args.push("--export-aae".into());
        log::debug!("AAE adjustments files will be exported");
    }

    if settings.dry_run {
        args.push("--dry-run".into());
    }

    args
}

/// Render a command line for the log, quoting arguments that need it.
pub fn display_command(program: &str, args: &[OsString]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|arg| {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || "{}?$".contains(c)) {
                format!("'{}'", arg)
            } else {
                arg.into_owned()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}
