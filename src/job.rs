// src/job.rs

//! Runs one job under its group lock and records it in the history log.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::errors::{JobwrapperError, Result, display_chain};
use crate::exec::{CommandRunner, OutputSink};
use crate::fs::FileSystem;
use crate::history::HistoryRecorder;
use crate::lock::{LockContext, Locker};

/// What to run and under which group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub group: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
}

impl JobRequest {
    pub fn new(group: impl Into<String>, executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            group: group.into(),
            executable: executable.into(),
            args,
        }
    }
}

/// Wires the lock, history and command collaborators together.
pub struct JobWrapper<'a> {
    config: &'a Config,
    fs: Arc<dyn FileSystem>,
    locker: &'a dyn Locker,
    runner: &'a dyn CommandRunner,
}

impl<'a> JobWrapper<'a> {
    pub fn new(
        config: &'a Config,
        fs: Arc<dyn FileSystem>,
        locker: &'a dyn Locker,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            fs,
            locker,
            runner,
        }
    }

    /// Run `request` to completion.
    ///
    /// The returned result is the job's own outcome. Failing to write the
    /// history or to release the lock afterwards is logged but does not
    /// change it.
    pub async fn run(
        &self,
        request: &JobRequest,
        cancel: CancellationToken,
        stdout: OutputSink,
        stderr: OutputSink,
    ) -> Result<()> {
        if request.group.is_empty() {
            return Err(JobwrapperError::Usage("group name must not be empty".to_string()));
        }

        let mut recorder = HistoryRecorder::new(
            Arc::clone(&self.fs),
            &self.config.lock_dir,
            self.config.history_lines,
            &request.executable,
            &request.args,
        )?;

        let ctx = LockContext::new(cancel.clone()).with_timeout(self.config.timeout);
        self.locker
            .acquire(&ctx, &request.group)
            .await
            .map_err(|source| JobwrapperError::Lock {
                group: request.group.clone(),
                source,
            })?;

        recorder.mark_execution_start();
        info!(
            group = %request.group,
            executable = ?request.executable,
            "running job"
        );

        let mut command = self
            .runner
            .command(cancel, &request.executable, &request.args);
        command.set_stdout(stdout);
        command.set_stderr(stderr);
        let outcome = command.run().await;

        recorder.mark_execution_end();

        let error_text = outcome.as_ref().err().map(|e| format!("{e:#}"));
        let log_path = recorder.log_path().to_path_buf();
        if let Err(e) = recorder.write_history(error_text.as_deref()) {
            error!(path = ?log_path, error = %display_chain(e), "error writing history");
        }

        if let Err(e) = self.locker.release(&request.group) {
            error!(group = %request.group, error = %display_chain(e), "error releasing lock");
        }

        outcome.map_err(|source| JobwrapperError::JobFailed {
            executable: request.executable.clone(),
            source,
        })
    }
}
