// src/exec/mod.rs

//! Child process execution layer.
//!
//! The orchestrator talks to a [`CommandRunner`] instead of spawning
//! processes itself, so tests can substitute a fake.
//!
//! - [`command`] provides [`RealCommandRunner`], built on
//!   `tokio::process::Command`.
//! - [`mock`] provides [`MockCommandRunner`] / [`MockCommand`], which emit
//!   canned output and a scripted result.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use anyhow::Result;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

pub mod command;
pub mod mock;

pub use command::RealCommandRunner;
pub use mock::{MockCommand, MockCommandRunner};

/// Destination for a child's stdout or stderr.
pub type OutputSink = Box<dyn AsyncWrite + Send + Sync + Unpin>;

/// Future returned by [`Command::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// A prepared, not yet started, child process.
pub trait Command: Send {
    fn set_stdout(&mut self, sink: OutputSink);
    fn set_stderr(&mut self, sink: OutputSink);

    /// Run to completion. Fails if the process cannot be started, exits
    /// unsuccessfully, or is cancelled.
    fn run(&mut self) -> RunFuture<'_>;
}

/// Creates [`Command`]s bound to a cancellation token.
pub trait CommandRunner: Send + Sync {
    fn command(
        &self,
        cancel: CancellationToken,
        program: &Path,
        args: &[String],
    ) -> Box<dyn Command>;
}
