// src/watch/mock.rs

//! In-memory handle backend for deterministic tests.
//!
//! Handles open only for directories that exist in the paired
//! [`MockFileSystem`]. Tests push events with [`MockBackend::emit`] and can
//! inspect how many times each path was opened and cancelled.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{DirwatchError, Result};
use crate::fs::mock::MockFileSystem;
use crate::fs::FileSystem;
use crate::watch::event::HandleEvent;
use crate::watch::handle::{CallbackSlot, DirHandle, EventCallback, HandleBackend};

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    live: HashMap<u64, (PathBuf, CallbackSlot)>,
    opens: HashMap<PathBuf, usize>,
    cancels: HashMap<PathBuf, usize>,
    failing: HashSet<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    fs: MockFileSystem,
    registry: Arc<Mutex<Registry>>,
}

impl MockBackend {
    pub fn new(fs: MockFileSystem) -> Self {
        Self {
            fs,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn fs(&self) -> &MockFileSystem {
        &self.fs
    }

    /// Make every future `open` of `path` fail, even if the directory exists.
    pub fn fail_open(&self, path: impl Into<PathBuf>) {
        self.lock().failing.insert(path.into());
    }

    /// Deliver `event` to every live, armed handle on `path`.
    /// Returns the number of handles that received it.
    pub fn emit(&self, path: impl AsRef<Path>, event: HandleEvent) -> usize {
        let path = path.as_ref();
        // Collect first so callbacks run without the registry lock held.
        let slots: Vec<CallbackSlot> = self
            .lock()
            .live
            .values()
            .filter(|(p, _)| p == path)
            .map(|(_, slot)| slot.clone())
            .collect();

        slots
            .iter()
            .filter(|slot| slot.deliver(event.clone()))
            .count()
    }

    pub fn open_count(&self, path: impl AsRef<Path>) -> usize {
        self.lock().opens.get(path.as_ref()).copied().unwrap_or(0)
    }

    pub fn cancel_count(&self, path: impl AsRef<Path>) -> usize {
        self.lock().cancels.get(path.as_ref()).copied().unwrap_or(0)
    }

    /// Paths with a handle that is open and not yet cancelled, sorted.
    pub fn live_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().live.values().map(|(p, _)| p.clone()).collect();
        paths.sort();
        paths
    }

    /// Every path that was ever opened, sorted.
    pub fn opened_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().opens.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HandleBackend for MockBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn DirHandle>> {
        let mut registry = self.lock();
        if registry.failing.contains(path) || !self.fs.is_dir(path) {
            return Err(DirwatchError::OpenFailed {
                path: path.to_path_buf(),
                source: notify::Error::path_not_found().add_path(path.to_path_buf()),
            });
        }

        let id = registry.next_id;
        registry.next_id += 1;
        let slot = CallbackSlot::default();
        registry.live.insert(id, (path.to_path_buf(), slot.clone()));
        *registry.opens.entry(path.to_path_buf()).or_default() += 1;

        Ok(Box::new(MockHandle {
            id,
            path: path.to_path_buf(),
            slot,
            open: true,
            registry: Arc::clone(&self.registry),
        }))
    }
}

pub struct MockHandle {
    id: u64,
    path: PathBuf,
    slot: CallbackSlot,
    open: bool,
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("open", &self.open)
            .finish()
    }
}

impl DirHandle for MockHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn arm(&mut self, on_event: EventCallback) {
        if self.open {
            self.slot.install(on_event);
        }
    }

    fn cancel(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.slot.clear();
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.live.remove(&self.id);
        *registry.cancels.entry(self.path.clone()).or_default() += 1;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn open_requires_existing_directory() {
        let fs = MockFileSystem::new();
        fs.add_dir("/r/a");
        let backend = MockBackend::new(fs);

        assert!(backend.open(Path::new("/r/a")).is_ok());
        assert!(backend.open(Path::new("/r/missing")).is_err());

        backend.fail_open("/r/a");
        assert!(backend.open(Path::new("/r/a")).is_err());
        assert_eq!(backend.open_count("/r/a"), 1);
    }

    #[test]
    fn emit_reaches_armed_handles_until_cancelled() {
        let fs = MockFileSystem::new();
        fs.add_dir("/r");
        let backend = MockBackend::new(fs);
        let hits = Arc::new(AtomicUsize::new(0));

        let mut handle = backend.open(Path::new("/r")).unwrap();
        assert_eq!(backend.emit("/r", HandleEvent::Changed), 0);

        let counter = Arc::clone(&hits);
        handle.arm(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(backend.emit("/r", HandleEvent::Changed), 1);

        handle.cancel();
        handle.cancel();
        assert_eq!(backend.emit("/r", HandleEvent::Changed), 0);
        assert_eq!(backend.cancel_count("/r"), 1);
        assert!(backend.live_paths().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
