//! Error types for the harness
//!
//! Step code returns the same `Result` alias, so a failing assertion, an I/O
//! failure and an HTTP failure inside a step all surface through one enum.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid metadata file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Remote Errors ===
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to report run: {0}")]
    Reporting(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Execution Errors ===
    #[error("{0}")]
    StepFailed(String),

    #[error("Failed to start '{}': {source}", executable.display())]
    ProcessSpawn {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a step failure with a human readable reason
    pub fn step_failed(reason: impl Into<String>) -> Self {
        Self::StepFailed(reason.into())
    }

    /// Create a spawn error for the given executable
    pub fn process_spawn(executable: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ProcessSpawn {
            executable: executable.into(),
            source,
        }
    }

    /// Whether this error came from harness configuration rather than the code under test
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ConfigParse(_) | Self::FileRead { .. }
        )
    }
}
