// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;

/// How a file is opened through [`FileSystem::open_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-write, creating the file if it is missing (`O_CREAT|O_RDWR`).
    ReadWriteCreate,
    /// Read-write on an existing file (`O_RDWR`).
    ReadWrite,
    /// Write-only, discarding previous contents (`O_WRONLY|O_TRUNC`).
    WriteTruncate,
}

/// An open file as handed out by a [`FileSystem`].
pub trait FileHandle: Read + Write + Send {}

impl<T: Read + Write + Send> FileHandle for T {}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
    fn open_file(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn FileHandle>>;
    fn remove(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;

    /// Read a whole file into a string.
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let mut contents = String::new();
        self.open_read(path)?
            .read_to_string(&mut contents)
            .with_context(|| format!("reading file {:?}", path))?;
        Ok(contents)
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder
            .create(path)
            .with_context(|| format!("creating dir {:?}", path))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path).with_context(|| format!("opening file {:?}", path))?;
        Ok(Box::new(file))
    }

    fn open_file(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn FileHandle>> {
        let mut options = fs::OpenOptions::new();
        match mode {
            OpenMode::ReadWriteCreate => options.read(true).write(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true),
            OpenMode::WriteTruncate => options.write(true).truncate(true),
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options
            .open(path)
            .with_context(|| format!("opening file {:?} ({:?})", path, mode))?;
        Ok(Box::new(file))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("removing file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

