//! Core error types for wordpace-core.
//!
//! Configuration problems are fatal before a session starts. Everything that
//! goes wrong once the trial loop is running is caught by the session runner
//! and turned into an aborted (but fully saved) session.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for wordpace-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors (config file, catalog, trial list)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Journal persistence errors
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// A presenter, input source or trigger sink failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

/// Configuration-specific errors.
///
/// Raised while loading the config file, the stimulus catalog or a persisted
/// trial list.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load a file
    #[error("Failed to load {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save a file
    #[error("Failed to save {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// A catalog or trial list row is malformed
    #[error("Malformed row {row} in {path}: {message}")]
    MalformedRow {
        path: PathBuf,
        row: usize,
        message: String,
    },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Journal-specific errors.
#[derive(Error, Debug)]
pub enum JournalError {
    /// Appending to a stream failed
    #[error("Failed to append to {path}: {source}")]
    AppendFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rewriting a finalized report failed
    #[error("Failed to finalize {path}: {source}")]
    FinalizeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Moving a prior artifact aside failed
    #[error("Failed to move aside {path}: {source}")]
    DiscardFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding failed
    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },
}

impl JournalError {
    pub(crate) fn csv(path: impl Into<PathBuf>, err: &csv::Error) -> Self {
        JournalError::Csv {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
