// src/lock/context.rs

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Why a [`LockContext`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation token plus an optional deadline.
///
/// Lock acquisition checks this on every retry and gives up as soon as it
/// fires. Cloning is cheap; clones observe the same token.
#[derive(Debug, Clone)]
pub struct LockContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl LockContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// A context that never fires on its own.
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    /// Bound the context by `timeout` from now, keeping any earlier deadline.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// unbounded.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Non-blocking check.
    pub fn check(&self) -> Option<DoneReason> {
        if self.cancel.is_cancelled() {
            return Some(DoneReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DoneReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn done(&self) -> DoneReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => DoneReason::Cancelled,
                    _ = sleep_until(deadline) => DoneReason::DeadlineExceeded,
                }
            }
            None => {
                self.cancel.cancelled().await;
                DoneReason::Cancelled
            }
        }
    }
}
