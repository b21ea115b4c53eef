// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::history::HistoryError;
use crate::lock::LockError;

#[derive(Error, Debug)]
pub enum JobwrapperError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("error acquiring lock for group '{group}'")]
    Lock {
        group: String,
        #[source]
        source: LockError,
    },

    #[error("error creating history writer")]
    History(#[from] HistoryError),

    #[error("job execution for '{}' failed", executable.display())]
    JobFailed {
        executable: PathBuf,
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, JobwrapperError>;

/// Render an error with its whole `source()` chain on one line.
pub fn display_chain<E>(err: E) -> String
where
    E: std::error::Error + Send + Sync + 'static,
{
    format!("{:#}", anyhow::Error::from(err))
}
