// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod history;
pub mod job;
pub mod lock;
pub mod logging;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate};
use crate::exec::RealCommandRunner;
use crate::fs::{FileSystem, RealFileSystem};
use crate::job::JobWrapper;
use crate::lock::FileLocker;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the file-backed group locker
/// - the real process runner
/// - Ctrl-C handling (cancels lock waiting and kills the child)
pub async fn run(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = load_and_validate(fs.as_ref(), &config_path)?;
    debug!(?config_path, ?config, "configuration loaded");

    let locker = FileLocker::new(&config, Arc::clone(&fs));
    let runner = RealCommandRunner;

    // Ctrl-C → cancel.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            cancel.cancel();
        });
    }

    let request = args.job_request();
    JobWrapper::new(&config, fs, &locker, &runner)
        .run(
            &request,
            cancel,
            Box::new(tokio::io::stdout()),
            Box::new(tokio::io::stderr()),
        )
        .await?;

    Ok(())
}
