#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use jobwrapper::config::{Config, validate_config};

/// Builder for `Config` to simplify test setup.
///
/// Starts from the documented defaults but with a lock directory that does
/// not depend on the user's home.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: Config {
                lock_dir: lock_dir.into(),
                ..Config::default()
            },
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn lock_filename(mut self, name: &str) -> Self {
        self.config.lock_filename = name.to_string();
        self
    }

    pub fn history_lines(mut self, lines: usize) -> Self {
        self.config.history_lines = lines;
        self
    }

    pub fn build(self) -> Config {
        validate_config(&self.config).expect("Failed to build valid config from builder");
        self.config
    }
}

/// History log path the recorder uses for `executable` under `lock_dir`.
pub fn history_log_path(lock_dir: &Path, executable: &str) -> PathBuf {
    let name = Path::new(executable)
        .file_name()
        .expect("executable has a file name")
        .to_string_lossy()
        .into_owned();
    lock_dir.join(format!("{name}.log"))
}
