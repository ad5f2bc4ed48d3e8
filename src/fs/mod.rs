// src/fs/mod.rs

//! Read-only filesystem access used by the watcher tree.
//!
//! Rescans go through [`FileSystem`] rather than `std::fs` directly so the
//! tree logic can be driven against [`mock::MockFileSystem`] in tests.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use tracing::warn;

pub mod mock;

/// Make `path` absolute and resolve `.` / `..` lexically.
///
/// Does not touch the path itself, so it works for directories that do not
/// exist (yet).
pub fn normalize_path(path: &Path) -> PathBuf {
    match path.absolutize() {
        Ok(abs) => abs.into_owned(),
        Err(err) => {
            warn!(path = ?path, "cannot absolutize path; using it as given: {err}");
            path.to_path_buf()
        }
    }
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn is_dir(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Immediate subdirectories of `path`, as full paths.
    ///
    /// Symlinks are never reported, even when they point at a directory.
    fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            // `file_type` does not follow symlinks.
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}
