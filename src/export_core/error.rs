use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    // Configuration errors
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Provided configuration path is not a file: {0}")]
    ConfigNotAFile(PathBuf),

    #[error("Error loading configuration file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cannot determine home directory to expand {0}")]
    HomeDirUnknown(PathBuf),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walker error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Logging
    #[error("Failed to initialize logging: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Export engine errors
    #[error("{0} not found. Install with: brew tap rhetbull/osxphotos && brew install osxphotos")]
    EngineNotFound(String),

    #[error("{program} installation appears broken: {reason}")]
    EngineBroken { program: String, reason: String },

    #[error("Export failed with return code {0}")]
    ExportFailed(i32),

    #[error("Export process was terminated by a signal")]
    ExportKilled,

    // Shutdown
    #[error("Cannot install signal handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),

    #[error("Interrupted by signal")]
    Interrupted,

    // Per-item failures reported after the run
    #[error("{0} item(s) failed")]
    Partial(ItemFailures),
}

/// Details about files or links that could not be processed.
#[derive(Debug, Default)]
pub struct ItemFailures {
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for ItemFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.failures.len())
    }
}

impl ItemFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.failures.push(ItemFailure {
            path,
            reason: reason.into(),
        });
    }

    pub fn extend(&mut self, other: ItemFailures) {
        self.failures.extend(other.failures);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemFailure> {
        self.failures.iter()
    }
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
