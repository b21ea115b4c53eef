// src/history/mod.rs

//! Bounded per-executable execution history.
//!
//! Each wrapped executable gets a log at `<log_dir>/<basename>.log` holding
//! one JSON [`HistoryRecord`] per line. The log is rewritten on every append
//! and never grows past `max_lines` records; the oldest go first.
//!
//! The read-rewrite sequence is not atomic across processes. Callers keep
//! writes for the same executable serialized, which the group lock does in
//! normal use.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::debug;

use crate::fs::{FileSystem, OpenMode};

pub mod record;

pub use record::{HistoryRecord, MAX_ARG_LENGTH, truncate_args};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("cannot derive a history log name from {0:?}")]
    InvalidExecutable(PathBuf),

    #[error("error opening history log {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("error reading history log {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error serializing history record for {path:?}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error writing history log {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Collects timing for one job invocation and appends it to the log.
#[derive(Debug)]
pub struct HistoryRecorder {
    fs: Arc<dyn FileSystem>,
    log_path: PathBuf,
    max_lines: usize,
    executable: String,
    executable_path: PathBuf,
    args: Vec<String>,
    started_at: DateTime<Local>,
    execution_started_at: Option<DateTime<Local>>,
    execution_ended_at: Option<DateTime<Local>>,
}

impl HistoryRecorder {
    /// Start a recorder for `executable_path`, creating its log if needed.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        log_dir: &Path,
        max_lines: usize,
        executable_path: &Path,
        args: &[String],
    ) -> Result<Self, HistoryError> {
        let started_at = Local::now();

        let executable = executable_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| HistoryError::InvalidExecutable(executable_path.to_path_buf()))?;
        let log_path = log_dir.join(format!("{executable}.log"));

        fs.create_dir_all(log_dir)
            .and_then(|_| fs.open_file(&log_path, OpenMode::ReadWriteCreate))
            .map_err(|source| HistoryError::Open {
                path: log_path.clone(),
                source,
            })?;

        Ok(Self {
            fs,
            log_path,
            max_lines,
            executable,
            executable_path: executable_path.to_path_buf(),
            args: args.to_vec(),
            started_at,
            execution_started_at: None,
            execution_ended_at: None,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Mark the moment the lock was obtained and the executable launched.
    pub fn mark_execution_start(&mut self) {
        self.execution_started_at = Some(Local::now());
    }

    pub fn mark_execution_end(&mut self) {
        self.execution_ended_at = Some(Local::now());
    }

    /// Build the record for the current state.
    pub fn record(&self, error: Option<&str>) -> HistoryRecord {
        let wait_ms = self
            .execution_started_at
            .map(|start| (start - self.started_at).num_milliseconds());
        let run_ms = match (self.execution_started_at, self.execution_ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        };

        HistoryRecord {
            started_at: self.started_at,
            execution_started_at: self.execution_started_at,
            execution_ended_at: self.execution_ended_at,
            wait_ms,
            run_ms,
            executable: self.executable.clone(),
            path: self.executable_path.display().to_string(),
            args: truncate_args(&self.args),
            error: error.map(str::to_string),
        }
    }

    /// Append the final record for this invocation.
    pub fn write_history(self, error: Option<&str>) -> Result<(), HistoryError> {
        let line = self
            .record(error)
            .to_line()
            .map_err(|source| HistoryError::Serialize {
                path: self.log_path.clone(),
                source,
            })?;
        append_line(self.fs.as_ref(), &self.log_path, self.max_lines, &line)
    }
}

/// Append `line` to the log at `path`, keeping at most `max_lines` lines.
///
/// A `max_lines` of zero still keeps the new line.
pub fn append_line(
    fs: &dyn FileSystem,
    path: &Path,
    max_lines: usize,
    line: &str,
) -> Result<(), HistoryError> {
    let keep = max_lines.max(1) - 1;
    let mut lines = read_tail(fs, path, keep)?;
    lines.push_back(line.to_string());

    let write_err = |source| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs
        .open_file(path, OpenMode::WriteTruncate)
        .map_err(|source| HistoryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    for line in &lines {
        file.write_all(line.as_bytes()).map_err(write_err)?;
        file.write_all(b"\n").map_err(write_err)?;
    }
    file.flush().map_err(write_err)?;

    debug!(path = ?path, records = lines.len(), "history written");
    Ok(())
}

/// Read the last `keep` non-empty lines of the log.
fn read_tail(fs: &dyn FileSystem, path: &Path, keep: usize) -> Result<VecDeque<String>, HistoryError> {
    let file = fs
        .open_file(path, OpenMode::ReadWriteCreate)
        .map_err(|source| HistoryError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let mut lines = VecDeque::with_capacity(keep + 1);
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| HistoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        lines.push_back(line);
        if lines.len() > keep {
            lines.pop_front();
        }
    }
    Ok(lines)
}
