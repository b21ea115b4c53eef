// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Config, DEFAULT_LOCK_DIR, RawConfig};
use crate::errors::{JobwrapperError, Result};
use crate::fs::FileSystem;

pub const CONFIG_FILE_NAME: &str = "jobwrapper.conf";

/// Load the raw TOML configuration from `path`.
///
/// A missing file is not an error: it yields an all-default `RawConfig`.
/// A file that exists but does not parse is.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    if !fs.exists(path) {
        debug!(path = ?path, "no config file; using defaults");
        return Ok(RawConfig::default());
    }

    let contents = fs.read_to_string(path)?;
    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path, apply defaults and validate.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = load_from_path(fs, &path).map_err(|e| match e {
        JobwrapperError::TomlError(err) => JobwrapperError::ConfigError(format!(
            "parsing {:?}: {}",
            path.as_ref(),
            err
        )),
        other => other,
    })?;
    Config::try_from(raw_config)
}

/// `~/.jobwrapper/jobwrapper.conf`, or a path relative to the working
/// directory when no home directory can be determined.
pub fn default_config_path() -> PathBuf {
    let base = match dirs::home_dir() {
        Some(home) => home.join(DEFAULT_LOCK_DIR),
        None => PathBuf::from(DEFAULT_LOCK_DIR),
    };
    base.join(CONFIG_FILE_NAME)
}
