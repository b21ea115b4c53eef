// src/config/validate.rs

use std::path::{Path, PathBuf};

use crate::config::model::{
    Config, DEFAULT_HISTORY_LINES, DEFAULT_LOCK_DIR, DEFAULT_LOCK_FILENAME, DEFAULT_TIMEOUT,
    RawConfig,
};
use crate::errors::{JobwrapperError, Result};

impl TryFrom<RawConfig> for Config {
    type Error = JobwrapperError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        Config::from_raw(raw, dirs::home_dir().as_deref())
    }
}

impl Config {
    /// Apply defaults to `raw`, resolve `lock_dir` against `home` and
    /// validate the result.
    pub fn from_raw(raw: RawConfig, home: Option<&Path>) -> Result<Config> {
        let timeout = match raw.timeout {
            Some(ref timeout) => timeout
                .to_duration()
                .map_err(|e| JobwrapperError::ConfigError(format!("timeout: {e}")))?,
            None => DEFAULT_TIMEOUT,
        };

        let lock_dir = raw.lock_dir.as_deref().unwrap_or(DEFAULT_LOCK_DIR);

        let config = Config {
            lock_dir: resolve_lock_dir(lock_dir, home),
            timeout,
            lock_filename: raw
                .lock_filename
                .unwrap_or_else(|| DEFAULT_LOCK_FILENAME.to_string()),
            history_lines: raw.history_lines.unwrap_or(DEFAULT_HISTORY_LINES),
        };

        validate_config(&config)?;
        Ok(config)
    }
}

/// Check basic sanity of an effective configuration.
pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.lock_dir.as_os_str().is_empty() {
        return Err(JobwrapperError::ConfigError(
            "lock_dir must not be empty".to_string(),
        ));
    }

    if cfg.timeout.is_zero() {
        return Err(JobwrapperError::ConfigError(
            "timeout must be greater than zero".to_string(),
        ));
    }

    if cfg.history_lines == 0 {
        return Err(JobwrapperError::ConfigError(
            "history_lines must be >= 1 (got 0)".to_string(),
        ));
    }

    let name = cfg.lock_filename.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(JobwrapperError::ConfigError(format!(
            "lock_filename '{}' must be a plain file name",
            name
        )));
    }

    Ok(())
}

/// `~` and relative paths are taken relative to the home directory.
fn resolve_lock_dir(raw: &str, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(raw);
    };

    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }

    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(path)
    }
}
