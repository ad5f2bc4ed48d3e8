// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The directory could not be registered with the OS watcher
    /// (missing, not a directory, or inaccessible).
    #[error("cannot watch {path:?}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("invalid exclude pattern: {0}")]
    InvalidPattern(String),

    /// The mutation worker has shut down (or a job on it panicked).
    #[error("mutation executor is no longer running")]
    ExecutorUnavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DirwatchError>;
