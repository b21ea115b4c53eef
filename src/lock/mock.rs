// src/lock/mock.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{LockContext, LockError, LockFuture, Locker};

type Hook = Arc<dyn Fn(&str) -> Result<(), LockError> + Send + Sync>;

/// In-memory [`Locker`] for tests.
///
/// By default it tracks held names in a map: acquiring a held name fails
/// with `AlreadyHeld`, releasing an unheld one with `NotHeld`. Either
/// operation can be overridden with a hook.
#[derive(Default)]
pub struct MockLocker {
    locks: Mutex<HashMap<String, bool>>,
    on_acquire: Option<Hook>,
    on_release: Option<Hook>,
}

impl std::fmt::Debug for MockLocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLocker")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl MockLocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_acquire(
        mut self,
        hook: impl Fn(&str) -> Result<(), LockError> + Send + Sync + 'static,
    ) -> Self {
        self.on_acquire = Some(Arc::new(hook));
        self
    }

    pub fn on_release(
        mut self,
        hook: impl Fn(&str) -> Result<(), LockError> + Send + Sync + 'static,
    ) -> Self {
        self.on_release = Some(Arc::new(hook));
        self
    }

    pub fn is_held(&self, group: &str) -> bool {
        let locks = self.locks.lock().unwrap();
        locks.get(group).copied().unwrap_or(false)
    }

    fn acquire_now(&self, group: &str) -> Result<(), LockError> {
        if let Some(hook) = &self.on_acquire {
            return hook(group);
        }

        let mut locks = self.locks.lock().unwrap();
        if locks.get(group).copied().unwrap_or(false) {
            return Err(LockError::AlreadyHeld(group.to_string()));
        }
        locks.insert(group.to_string(), true);
        Ok(())
    }
}

impl Locker for MockLocker {
    fn acquire<'a>(&'a self, _ctx: &'a LockContext, group: &'a str) -> LockFuture<'a> {
        let result = self.acquire_now(group);
        Box::pin(async move { result })
    }

    fn release(&self, group: &str) -> Result<(), LockError> {
        if let Some(hook) = &self.on_release {
            return hook(group);
        }

        let mut locks = self.locks.lock().unwrap();
        if !locks.get(group).copied().unwrap_or(false) {
            return Err(LockError::NotHeld(group.to_string()));
        }
        locks.remove(group);
        Ok(())
    }
}
