// SPDX-License-Identifier: MIT

//! File-system collaborator
//!
//! Durable checkpoints and bundle-identifier extraction touch the disk only
//! through [`FileSystem`], so both can be exercised against
//! [`MemoryFileSystem`] in tests.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Abstract filesystem interface
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Write a file, creating parent directories as needed
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    fn is_dir(&self, path: &Path) -> bool;
    /// Entries of a directory as full paths, sorted
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write to a sibling temp file and rename so readers never see a torn file
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        entries.sort();
        Ok(entries)
    }
}

/// In-memory filesystem. Directories exist implicitly as prefixes of files,
/// or explicitly through [`MemoryFileSystem::add_dir`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.as_ref().to_path_buf(), content.into());
        }
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        if let Ok(mut dirs) = self.dirs.lock() {
            dirs.push(path.as_ref().to_path_buf());
        }
    }

    fn lock_files(&self) -> io::Result<std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| io::Error::other("memory filesystem poisoned"))
    }

    fn known_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.dirs.lock().map(|d| d.clone()).unwrap_or_default();
        if let Ok(files) = self.files.lock() {
            for path in files.keys() {
                let mut current = path.parent();
                while let Some(dir) = current {
                    if dir.as_os_str().is_empty() {
                        break;
                    }
                    dirs.push(dir.to_path_buf());
                    current = dir.parent();
                }
            }
        }
        dirs
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.lock_files()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
            || self.is_dir(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.lock_files()?
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", path)))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.lock_files()?
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.known_dirs().iter().any(|d| d == path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{:?} is not a directory", path),
            ));
        }
        let dirs = self.known_dirs();
        let files: Vec<PathBuf> = self.lock_files()?.keys().cloned().collect();
        let mut children: Vec<PathBuf> = files
            .into_iter()
            .chain(dirs)
            .filter(|p| p.parent() == Some(path))
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }
}
