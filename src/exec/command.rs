// src/exec/command.rs

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Command, CommandRunner, OutputSink, RunFuture};

/// Spawns real processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn command(
        &self,
        cancel: CancellationToken,
        program: &Path,
        args: &[String],
    ) -> Box<dyn Command> {
        Box::new(RealCommand {
            program: program.to_path_buf(),
            args: args.to_vec(),
            cancel,
            stdout: None,
            stderr: None,
        })
    }
}

/// A child process; output goes to the configured sinks, or is inherited
/// from the wrapper when no sink is set.
pub struct RealCommand {
    program: PathBuf,
    args: Vec<String>,
    cancel: CancellationToken,
    stdout: Option<OutputSink>,
    stderr: Option<OutputSink>,
}

impl Command for RealCommand {
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

impl RealCommand {
    async fn run_inner(&mut self) -> Result<()> {
        info!(program = ?self.program, args = ?self.args, "starting process");

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(stdio_for(&self.stdout))
            .stderr(stdio_for(&self.stderr))
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process {:?}", self.program))?;

        let stdout_copy = forward(child.stdout.take(), self.stdout.take());
        let stderr_copy = forward(child.stderr.take(), self.stderr.take());

        let status = tokio::select! {
            status = child.wait() => {
                status.with_context(|| format!("waiting for process {:?}", self.program))?
            }
            _ = self.cancel.cancelled() => {
                info!(program = ?self.program, "cancellation requested; killing process");
                if let Err(e) = child.kill().await {
                    warn!(program = ?self.program, error = %e, "failed to kill child process");
                }
                drain(stdout_copy).await;
                drain(stderr_copy).await;
                bail!("process {:?} cancelled", self.program);
            }
        };

        drain(stdout_copy).await;
        drain(stderr_copy).await;

        info!(
            program = ?self.program,
            exit_code = status.code().unwrap_or(-1),
            success = status.success(),
            "process exited"
        );

        if !status.success() {
            bail!("process {:?} exited with {}", self.program, status);
        }
        Ok(())
    }
}

fn stdio_for(sink: &Option<OutputSink>) -> Stdio {
    if sink.is_some() {
        Stdio::piped()
    } else {
        Stdio::inherit()
    }
}

/// Copy a child pipe into its sink on a separate task so the child never
/// blocks on a full pipe.
fn forward<R>(reader: Option<R>, sink: Option<OutputSink>) -> Option<JoinHandle<std::io::Result<u64>>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (mut reader, mut sink) = (reader?, sink?);
    Some(tokio::spawn(async move {
        let copied = tokio::io::copy(&mut reader, &mut sink).await?;
        sink.flush().await?;
        Ok(copied)
    }))
}

async fn drain(copy: Option<JoinHandle<std::io::Result<u64>>>) {
    let Some(copy) = copy else {
        return;
    };
    match copy.await {
        Ok(Ok(bytes)) => debug!(bytes, "output forwarded"),
        Ok(Err(e)) => warn!(error = %e, "forwarding child output failed"),
        Err(e) => warn!(error = %e, "output forwarding task panicked"),
    }
}
