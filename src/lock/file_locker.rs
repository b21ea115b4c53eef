// src/lock/file_locker.rs

//! OS advisory lock implementation of [`Locker`].

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fs::FileSystem;

use super::{LockContext, LockError, LockFuture, Locker, validate_group};

/// First wait after a contended `try_lock`.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound for the wait between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(15);

/// Wait to use after `current`: doubled, kept within
/// `INITIAL_BACKOFF..=MAX_BACKOFF`.
pub fn next_backoff(current: Duration) -> Duration {
    current
        .checked_mul(2)
        .unwrap_or(MAX_BACKOFF)
        .clamp(INITIAL_BACKOFF, MAX_BACKOFF)
}

/// Cached per-group state.
///
/// `file` stays open after release so a later acquisition in the same
/// process reuses it.
#[derive(Debug)]
struct GroupHandle {
    path: PathBuf,
    file: Option<File>,
    locked: bool,
}

impl GroupHandle {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            locked: false,
        }
    }
}

/// Lock manager backed by lock files under `lock_dir`.
///
/// Hold one instance per process and share it by reference; the handle
/// cache inside is what lets same-process re-acquisition fail fast.
#[derive(Debug)]
pub struct FileLocker {
    lock_dir: PathBuf,
    lock_filename: String,
    fs: Arc<dyn FileSystem>,
    handles: Mutex<HashMap<String, GroupHandle>>,
}

impl FileLocker {
    pub fn new(config: &Config, fs: Arc<dyn FileSystem>) -> Self {
        Self::with_paths(&config.lock_dir, &config.lock_filename, fs)
    }

    pub fn with_paths(
        lock_dir: impl Into<PathBuf>,
        lock_filename: impl Into<String>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            lock_dir: lock_dir.into(),
            lock_filename: lock_filename.into(),
            fs,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// `<lock_dir>/<group>/<lock_filename>`
    pub fn lock_file_path(&self, group: &str) -> PathBuf {
        self.lock_dir.join(group).join(&self.lock_filename)
    }

    /// Whether this locker currently holds `group`.
    pub fn is_held(&self, group: &str) -> bool {
        self.handles()
            .get(group)
            .map(|handle| handle.locked)
            .unwrap_or(false)
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<String, GroupHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire_inner(&self, ctx: &LockContext, group: &str) -> Result<(), LockError> {
        validate_group(group)?;

        let group_dir = self.lock_dir.join(group);
        self.fs
            .create_dir_all(&group_dir)
            .map_err(|source| LockError::CreateDir {
                group: group.to_string(),
                dir: group_dir.clone(),
                source,
            })?;

        let path = group_dir.join(&self.lock_filename);

        // Take the cached file out of the handle so no other in-process
        // acquirer polls on the same open file description.
        let cached = {
            let mut handles = self.handles();
            let handle = handles
                .entry(group.to_string())
                .or_insert_with(|| GroupHandle::new(path.clone()));
            if handle.locked {
                return Err(LockError::AlreadyHeld(group.to_string()));
            }
            handle.file.take()
        };

        let file = match cached {
            Some(file) => file,
            None => open_lock_file(&path).map_err(|source| LockError::Acquire {
                group: group.to_string(),
                path: path.clone(),
                source,
            })?,
        };

        let mut backoff = INITIAL_BACKOFF;
        loop {
            if let Some(reason) = ctx.check() {
                self.park(group, file);
                return Err(LockError::from_done(reason, group));
            }

            match try_lock(&file) {
                Ok(true) => break,
                Ok(false) => {}
                Err(source) => {
                    return Err(LockError::Acquire {
                        group: group.to_string(),
                        path,
                        source,
                    });
                }
            }

            debug!(
                group,
                backoff_ms = backoff.as_millis() as u64,
                "lock busy; waiting before retry"
            );

            tokio::select! {
                reason = ctx.done() => {
                    self.park(group, file);
                    return Err(LockError::from_done(reason, group));
                }
                _ = tokio::time::sleep(backoff) => {
                    backoff = next_backoff(backoff);
                }
            }
        }

        {
            let mut handles = self.handles();
            let handle = handles
                .entry(group.to_string())
                .or_insert_with(|| GroupHandle::new(path.clone()));
            handle.file = Some(file);
            handle.locked = true;
        }

        info!(group, path = ?path, "lock acquired");
        Ok(())
    }

    /// Return an unlocked file to the cache after a failed wait.
    fn park(&self, group: &str, file: File) {
        let mut handles = self.handles();
        if let Some(handle) = handles.get_mut(group) {
            if !handle.locked && handle.file.is_none() {
                handle.file = Some(file);
            }
        }
    }
}

impl Locker for FileLocker {
    fn acquire<'a>(&'a self, ctx: &'a LockContext, group: &'a str) -> LockFuture<'a> {
        Box::pin(self.acquire_inner(ctx, group))
    }

    fn release(&self, group: &str) -> Result<(), LockError> {
        let mut handles = self.handles();
        let handle = match handles.get_mut(group) {
            Some(handle) if handle.locked => handle,
            _ => return Err(LockError::NotHeld(group.to_string())),
        };

        match handle.file.as_ref() {
            Some(file) => FileExt::unlock(file).map_err(|source| LockError::Release {
                group: group.to_string(),
                path: handle.path.clone(),
                source,
            })?,
            None => warn!(group, "locked handle without an open file"),
        }
        handle.locked = false;

        info!(group, path = ?handle.path, "lock released");
        Ok(())
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path)
}

/// `Ok(false)` when another holder has the lock.
fn try_lock(file: &File) -> io::Result<bool> {
    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(e) if is_contended(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
