//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use tilekeeper::config::ConfigFileError;
use tilekeeper::coord::CoordError;
use tilekeeper::prefetch::{NetworkError, SourceError};

use crate::output;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// The region key is not in the catalogue
    UnknownRegion(String),
    /// Failed to load config.ini
    Config(ConfigFileError),
    /// The configured tile servers are unusable
    Source(SourceError),
    /// Failed to create the HTTP client
    HttpClient(NetworkError),
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to install the Ctrl-C handler
    SignalHandler(String),
    /// Failed to create the Tokio runtime
    Runtime(std::io::Error),
    /// The region (after zoom overrides) is invalid
    Region(CoordError),
    /// Failed to create a directory or write a file
    FileWrite { path: PathBuf, error: std::io::Error },
    /// Failed to serialize the metadata sidecar
    Metadata(serde_json::Error),
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::UnknownRegion(_) => {
                eprintln!();
                output::print_region_list();
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!(
                    "Check {} or pass another file with --config",
                    tilekeeper::config::config_file_path().display()
                );
            }
            CliError::Region(_) => {
                eprintln!();
                eprintln!("Zoom levels must satisfy --min-zoom <= --max-zoom <= 19");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::UnknownRegion(key) => write!(f, "Unknown region '{}'", key),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Source(e) => write!(f, "Invalid tile server configuration: {}", e),
            CliError::HttpClient(e) => write!(f, "{}", e),
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::SignalHandler(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Region(e) => write!(f, "Invalid region: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write '{}': {}", path.display(), error)
            }
            CliError::Metadata(e) => write!(f, "Failed to serialize metadata: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Source(e) => Some(e),
            CliError::HttpClient(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Region(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            CliError::Metadata(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Region(e)
    }
}
