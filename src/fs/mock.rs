// src/fs/mock.rs

use super::{FileHandle, FileSystem, OpenMode};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    denied: HashSet<PathBuf>,
}

impl MockState {
    fn check_allowed(&self, path: &Path) -> io::Result<()> {
        if self.denied.iter().any(|denied| path.starts_with(denied)) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }
        Ok(())
    }

    fn ensure_dir_entry(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.entries
                .entry(ancestor.to_path_buf())
                .or_insert(MockEntry::Dir);
        }
    }

    fn put_file(&mut self, path: &Path, content: Vec<u8>) {
        if let Some(parent) = path.parent() {
            self.ensure_dir_entry(parent);
        }
        self.entries
            .insert(path.to_path_buf(), MockEntry::File(content));
    }
}

/// In-memory filesystem for tests.
///
/// Clones share the same underlying state, so a test can keep one handle
/// for inspection while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.state.lock().unwrap();
        state.put_file(path.as_ref(), content.into());
    }

    /// Current contents of a file, if it exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let state = self.state.lock().unwrap();
        match state.entries.get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(String::from_utf8_lossy(content).into_owned()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.entries.get(path.as_ref()), Some(MockEntry::Dir))
    }

    /// Make every operation on `path` (and anything below it) fail with
    /// `PermissionDenied`.
    pub fn deny(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.denied.insert(path.as_ref().to_path_buf());
    }

    pub fn allow(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.denied.remove(path.as_ref());
    }
}

impl FileSystem for MockFileSystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check_allowed(path)?;
        if let Some(MockEntry::File(_)) = state.entries.get(path) {
            return Err(anyhow!("Not a directory: {:?}", path));
        }
        state.ensure_dir_entry(path);
        Ok(())
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let state = self.state.lock().unwrap();
        state.check_allowed(path)?;
        match state.entries.get(path) {
            Some(MockEntry::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {:?}", path),
            )
            .into()),
        }
    }

    fn open_file(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn FileHandle>> {
        let mut state = self.state.lock().unwrap();
        state.check_allowed(path)?;

        let existing = match state.entries.get(path) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            Some(MockEntry::Dir) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => None,
        };

        let initial = match (mode, existing) {
            (OpenMode::WriteTruncate, Some(_)) => {
                state.put_file(path, Vec::new());
                Vec::new()
            }
            (OpenMode::ReadWriteCreate, None) => {
                state.put_file(path, Vec::new());
                Vec::new()
            }
            (_, Some(content)) => content,
            (_, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("File not found: {:?}", path),
                )
                .into());
            }
        };

        Ok(Box::new(MockFile {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            cursor: Cursor::new(initial),
            readable: mode != OpenMode::WriteTruncate,
            dirty: false,
        }))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check_allowed(path)?;
        match state.entries.get(path) {
            Some(MockEntry::File(_)) => {
                state.entries.remove(path);
                Ok(())
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.entries.contains_key(path)
    }
}

/// Open handle into a [`MockFileSystem`] file.
///
/// Writes are buffered and published back on `flush` or drop.
struct MockFile {
    state: Arc<Mutex<MockState>>,
    path: PathBuf,
    cursor: Cursor<Vec<u8>>,
    readable: bool,
    dirty: bool,
}

impl MockFile {
    fn commit(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("mock filesystem poisoned"))?;
        state.check_allowed(&self.path)?;
        state.put_file(&self.path, self.cursor.get_ref().clone());
        self.dirty = false;
        Ok(())
    }
}

impl Read for MockFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.readable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file not opened for reading",
            ));
        }
        self.cursor.read(buf)
    }
}

impl Write for MockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.cursor.write(buf)?;
        self.dirty = true;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit()
    }
}

impl Drop for MockFile {
    fn drop(&mut self) {
        let _ = self.commit();
    }
}
