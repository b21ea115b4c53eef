// src/history/record.rs

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Arguments longer than this many characters are cut in history records.
pub const MAX_ARG_LENGTH: usize = 15;

/// One line of a history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// When the wrapper was invoked (before waiting for the lock).
    pub started_at: DateTime<Local>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_started_at: Option<DateTime<Local>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_ended_at: Option<DateTime<Local>>,

    /// Time spent waiting for the group lock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<i64>,

    /// Time the executable itself ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_ms: Option<i64>,

    /// Base name of the executable.
    pub executable: String,

    /// Executable path as invoked.
    pub path: String,

    /// Truncated arguments, see [`truncate_args`].
    pub args: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryRecord {
    /// Serialize to a single line (no trailing newline).
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// Cut every argument to its first [`MAX_ARG_LENGTH`] characters and join
/// them with single spaces.
pub fn truncate_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| truncate_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_arg(arg: &str) -> &str {
    match arg.char_indices().nth(MAX_ARG_LENGTH) {
        Some((idx, _)) => &arg[..idx],
        None => arg,
    }
}
