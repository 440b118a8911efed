//! Error types for the storage engine and environment.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned by engine and environment operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corruption: {}: {reason}", path.display())]
    Corruption { path: PathBuf, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database does not exist: {} (create_if_missing is false)", .0.display())]
    NotFound(PathBuf),
}

impl EngineError {
    /// Build a closure that attaches `path` to an I/O error, for use with `map_err`.
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corruption(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corruption {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
