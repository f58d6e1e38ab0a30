//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The settings file is not JSON, or a value has the wrong type.
    #[error("malformed settings in {}: {source}", path.display())]
    Malformed {
        /// File whose contents were rejected.
        path: PathBuf,
        /// Parser or type error, with line and column when known.
        source: serde_json::Error,
    },
    /// The compiled defaults could not be encoded as a merge base.
    #[error("cannot encode default settings: {0}")]
    Defaults(#[source] serde_json::Error),
    /// A value the hub cannot run with, such as a zero queue capacity.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
