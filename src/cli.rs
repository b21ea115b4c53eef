// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::job::JobRequest;

/// Command-line arguments for `jobwrapper`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobwrapper",
    version,
    about = "Run a command so that at most one job per group runs at a time.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `~/.jobwrapper/jobwrapper.conf`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBWRAPPER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Lock group; jobs sharing a group never run concurrently.
    #[arg(value_name = "GROUP")]
    pub group: String,

    /// Executable to run once the group lock is held.
    #[arg(value_name = "EXECUTABLE")]
    pub executable: PathBuf,

    /// Arguments passed through to the executable.
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

impl CliArgs {
    pub fn job_request(&self) -> JobRequest {
        JobRequest::new(self.group.clone(), self.executable.clone(), self.args.clone())
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
