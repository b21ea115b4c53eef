// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default lock directory, relative to the user's home directory.
pub const DEFAULT_LOCK_DIR: &str = ".jobwrapper";
pub const DEFAULT_LOCK_FILENAME: &str = ".lockfile";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_HISTORY_LINES: usize = 5;

/// Configuration file as read from TOML, before defaults and validation.
///
/// ```toml
/// lock_dir = "/var/lib/jobwrapper"
/// timeout = "45m"        # or an integer number of seconds
/// lock_filename = ".lockfile"
/// history_lines = 10
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub lock_dir: Option<String>,

    #[serde(default)]
    pub timeout: Option<RawDuration>,

    #[serde(default)]
    pub lock_filename: Option<String>,

    #[serde(default)]
    pub history_lines: Option<usize>,
}

/// `timeout` accepts either whole seconds or a suffixed string (`"90s"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    pub fn to_duration(&self) -> Result<Duration, String> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            RawDuration::Text(text) => parse_duration(text),
        }
    }
}

/// Effective configuration with defaults applied and paths resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root for lock directories and history logs.
    pub lock_dir: PathBuf,

    /// Upper bound on how long lock acquisition may wait.
    pub timeout: Duration,

    /// Name of the lock file inside each group directory.
    pub lock_filename: String,

    /// Maximum number of records kept per history log.
    pub history_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        let lock_dir = match dirs::home_dir() {
            Some(home) => home.join(DEFAULT_LOCK_DIR),
            None => PathBuf::from(DEFAULT_LOCK_DIR),
        };
        Self {
            lock_dir,
            timeout: DEFAULT_TIMEOUT,
            lock_filename: DEFAULT_LOCK_FILENAME.to_string(),
            history_lines: DEFAULT_HISTORY_LINES,
        }
    }
}

/// Parse a duration string like `"500ms"`, `"3s"`, `"30m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
