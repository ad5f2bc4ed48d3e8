// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File,
    Dir(Vec<String>), // List of child names
}

/// In-memory directory tree. Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `path` and any missing ancestors as directories.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        ensure_dir_entry(&mut entries, path.as_ref());
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        if let Some(parent) = path.parent() {
            ensure_dir_entry(&mut entries, parent);
            link_into_parent(&mut entries, path);
        }
        entries.insert(path.to_path_buf(), MockEntry::File);
    }

    /// Remove `path` and everything beneath it. Returns false if it did not exist.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut entries = self.lock();
        if !entries.contains_key(path) {
            return false;
        }
        entries.retain(|p, _| !p.starts_with(path));
        unlink_from_parent(&mut entries, path);
        true
    }

    /// Move the subtree at `from` to `to`.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        let mut entries = self.lock();
        if !entries.contains_key(from) {
            return Err(anyhow!("No such entry: {:?}", from));
        }

        let moved: Vec<(PathBuf, MockEntry)> = entries
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, e)| (p.clone(), e.clone()))
            .collect();
        entries.retain(|p, _| !p.starts_with(from));
        unlink_from_parent(&mut entries, from);

        for (old, entry) in moved {
            let suffix = old.strip_prefix(from).map_err(|e| anyhow!("{e}"))?;
            let target = if suffix.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(suffix)
            };
            entries.insert(target, entry);
        }
        if let Some(parent) = to.parent() {
            ensure_dir_entry(&mut entries, parent);
            link_into_parent(&mut entries, to);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = path.parent() {
        if parent != path && !parent.as_os_str().is_empty() {
            ensure_dir_entry(entries, parent);
            link_into_parent(entries, path);
        }
    }
}

fn link_into_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
    else {
        return;
    };
    if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

fn unlink_from_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
    else {
        return;
    };
    if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
        children.retain(|c| c != name);
    }
}

impl FileSystem for MockFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = self.lock();
        match entries.get(path) {
            Some(MockEntry::Dir(children)) => Ok(children
                .iter()
                .map(|name| path.join(name))
                .filter(|p| matches!(entries.get(p), Some(MockEntry::Dir(_))))
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
