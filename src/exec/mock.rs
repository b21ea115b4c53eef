// src/exec/mock.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::{Command, CommandRunner, OutputSink, RunFuture};

type RunFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Scripted [`Command`]: writes canned output, optionally waits, then
/// returns whatever the run hook says.
#[derive(Default)]
pub struct MockCommand {
    pub stdout_content: String,
    pub stderr_content: String,
    pub delay: Option<Duration>,
    run_fn: Option<RunFn>,
    cancel: CancellationToken,
    stdout: Option<OutputSink>,
    stderr: Option<OutputSink>,
}

impl Clone for MockCommand {
    /// Sinks are per-run and not carried over.
    fn clone(&self) -> Self {
        Self {
            stdout_content: self.stdout_content.clone(),
            stderr_content: self.stderr_content.clone(),
            delay: self.delay,
            run_fn: self.run_fn.clone(),
            cancel: self.cancel.clone(),
            stdout: None,
            stderr: None,
        }
    }
}

impl MockCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdout(mut self, content: impl Into<String>) -> Self {
        self.stdout_content = content.into();
        self
    }

    pub fn with_stderr(mut self, content: impl Into<String>) -> Self {
        self.stderr_content = content.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_run(mut self, run: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.run_fn = Some(Arc::new(run));
        self
    }

    async fn run_inner(&mut self) -> Result<()> {
        if let Some(sink) = self.stdout.as_mut() {
            write_all(sink, &self.stdout_content).await?;
        }
        if let Some(sink) = self.stderr.as_mut() {
            write_all(sink, &self.stderr_content).await?;
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => bail!("mock command cancelled"),
            }
        }

        match &self.run_fn {
            Some(run) => run(),
            None => Ok(()),
        }
    }
}

async fn write_all(sink: &mut OutputSink, content: &str) -> Result<()> {
    if content.is_empty() {
        return Ok(());
    }
    sink.write_all(content.as_bytes()).await?;
    sink.flush().await?;
    Ok(())
}

impl Command for MockCommand {
    fn set_stdout(&mut self, sink: OutputSink) {
        self.stdout = Some(sink);
    }

    fn set_stderr(&mut self, sink: OutputSink) {
        self.stderr = Some(sink);
    }

    fn run(&mut self) -> RunFuture<'_> {
        Box::pin(self.run_inner())
    }
}

/// One call to [`MockCommandRunner::command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// [`CommandRunner`] that hands out clones of a template [`MockCommand`]
/// and records every invocation.
#[derive(Clone, Default)]
pub struct MockCommandRunner {
    template: MockCommand,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl MockCommandRunner {
    pub fn new(template: MockCommand) -> Self {
        Self {
            template,
            invocations: Arc::default(),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

impl CommandRunner for MockCommandRunner {
    fn command(
        &self,
        cancel: CancellationToken,
        program: &Path,
        args: &[String],
    ) -> Box<dyn Command> {
        self.invocations.lock().unwrap().push(Invocation {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });

        let mut command = self.template.clone();
        command.cancel = cancel;
        Box::new(command)
    }
}
