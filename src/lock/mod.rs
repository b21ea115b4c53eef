// src/lock/mod.rs

//! Group-scoped exclusive locking.
//!
//! A *group* is a caller-supplied name (e.g. `"backup"`). Every group maps to
//! one lock file at `<lock_dir>/<group>/<lock_filename>`, and at most one
//! holder across all cooperating processes owns the OS advisory lock on it.
//!
//! - [`file_locker`] provides [`FileLocker`], the production implementation
//!   backed by `flock`-style advisory locks (via `fs2`) with exponential
//!   backoff polling.
//! - [`mock`] provides [`MockLocker`], an in-memory fake for tests.
//! - [`context`] provides [`LockContext`], which bounds how long an
//!   acquisition may wait.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;

pub mod context;
pub mod file_locker;
pub mod mock;

pub use context::{DoneReason, LockContext};
pub use file_locker::{FileLocker, INITIAL_BACKOFF, MAX_BACKOFF, next_backoff};
pub use mock::MockLocker;

/// Future returned by [`Locker::acquire`].
pub type LockFuture<'a> = Pin<Box<dyn Future<Output = Result<(), LockError>> + Send + 'a>>;

/// Exclusive acquire/release keyed by group name.
pub trait Locker: Send + Sync {
    /// Take the exclusive lock for `group`, waiting until `ctx` fires at most.
    fn acquire<'a>(&'a self, ctx: &'a LockContext, group: &'a str) -> LockFuture<'a>;

    /// Release a lock previously taken with [`Locker::acquire`].
    fn release(&self, group: &str) -> Result<(), LockError>;
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("invalid lock group name '{0}'")]
    InvalidGroup(String),

    #[error("error creating lock directory {dir:?} for group '{group}'")]
    CreateDir {
        group: String,
        dir: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("lock {0} already held")]
    AlreadyHeld(String),

    #[error("lock {0} does not exist")]
    NotHeld(String),

    #[error("timed out acquiring lock for group '{0}'")]
    TimedOut(String),

    #[error("cancelled while acquiring lock for group '{0}'")]
    Cancelled(String),

    #[error("failed to acquire lock {group} ({path:?})")]
    Acquire {
        group: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to release lock {group} ({path:?})")]
    Release {
        group: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// Map a fired context to the matching error for `group`.
    pub fn from_done(reason: DoneReason, group: &str) -> Self {
        match reason {
            DoneReason::Cancelled => LockError::Cancelled(group.to_string()),
            DoneReason::DeadlineExceeded => LockError::TimedOut(group.to_string()),
        }
    }
}

/// Reject names that would escape the lock directory.
pub(crate) fn validate_group(group: &str) -> Result<(), LockError> {
    let bad = group.is_empty()
        || group == "."
        || group == ".."
        || group.contains('/')
        || group.contains('\\')
        || group.contains('\0');
    if bad {
        return Err(LockError::InvalidGroup(group.to_string()));
    }
    Ok(())
}
