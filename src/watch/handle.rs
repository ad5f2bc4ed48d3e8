// src/watch/handle.rs

//! OS watch registrations, one per directory.
//!
//! A [`DirHandle`] owns exactly one registration. It is opened by a
//! [`HandleBackend`], armed with a callback, and cancelled exactly once.
//! Production code uses [`NotifyBackend`]; tests can swap in
//! [`crate::watch::mock::MockBackend`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::errors::{DirwatchError, Result};
use crate::watch::classify::classify_batch;
use crate::watch::event::HandleEvent;

/// Callback invoked with classified events, from a background thread.
pub type EventCallback = Box<dyn Fn(HandleEvent) + Send + Sync + 'static>;

/// Factory for directory handles.
pub trait HandleBackend: Send + Sync + fmt::Debug {
    /// Register `path` with the OS in notification-only mode.
    ///
    /// Fails with [`DirwatchError::OpenFailed`] if the path is missing, not a
    /// directory, or cannot be watched. Nothing is held on failure.
    fn open(&self, path: &Path) -> Result<Box<dyn DirHandle>>;
}

/// One open OS watch registration.
pub trait DirHandle: Send + fmt::Debug {
    fn path(&self) -> &Path;

    /// Start delivering events to `on_event`. Events that arrive before the
    /// handle is armed are dropped.
    fn arm(&mut self, on_event: EventCallback);

    /// Release the OS registration. Idempotent. Once this returns, the
    /// callback is never invoked again.
    fn cancel(&mut self);

    fn is_open(&self) -> bool;
}

/// Shared slot holding the armed callback.
///
/// Delivery holds the lock for the duration of the callback, so clearing the
/// slot waits out any in-flight delivery. Callbacks must therefore never
/// cancel their own handle synchronously.
#[derive(Clone, Default)]
pub(crate) struct CallbackSlot {
    inner: Arc<Mutex<Option<EventCallback>>>,
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("armed", &self.lock().is_some())
            .finish()
    }
}

impl CallbackSlot {
    fn lock(&self) -> MutexGuard<'_, Option<EventCallback>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn install(&self, callback: EventCallback) {
        *self.lock() = Some(callback);
    }

    pub(crate) fn clear(&self) {
        self.lock().take();
    }

    /// Returns true if a callback was armed and received the event.
    pub(crate) fn deliver(&self, event: HandleEvent) -> bool {
        let guard = self.lock();
        match guard.as_ref() {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }
}

/// Backend built on one shared `notify::RecommendedWatcher` (inotify,
/// FSEvents, ...).
///
/// Every handle is a single non-recursive registration on that watcher, so a
/// tree of any size costs one OS watcher instance and one event thread.
/// Events are routed to the handles registered on the path they name and on
/// its parent, then classified relative to each handle's own directory.
/// Clones share the watcher.
#[derive(Debug, Clone, Default)]
pub struct NotifyBackend {
    shared: Arc<SharedWatcher>,
}

#[derive(Default)]
struct SharedWatcher {
    config: Config,
    /// Created on the first open. Also serializes watch / unwatch calls.
    watcher: Mutex<Option<RecommendedWatcher>>,
    routes: Arc<Mutex<Routes>>,
}

impl fmt::Debug for SharedWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedWatcher")
            .field("registrations", &lock(&self.routes).by_path.len())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Routes {
    next_id: u64,
    by_path: HashMap<PathBuf, Vec<(u64, CallbackSlot)>>,
}

impl Routes {
    /// Registered directories an event may concern: each path it names
    /// (the directory itself changed) and each path's parent (an entry of
    /// the directory changed).
    fn targets(&self, event: &Event) -> BTreeSet<PathBuf> {
        event
            .paths
            .iter()
            .flat_map(|p| std::iter::once(p.as_path()).chain(p.parent()))
            .filter(|p| self.by_path.contains_key(*p))
            .map(Path::to_path_buf)
            .collect()
    }

    fn slots(&self, path: &Path) -> Vec<CallbackSlot> {
        self.by_path
            .get(path)
            .map(|slots| slots.iter().map(|(_, slot)| slot.clone()).collect())
            .unwrap_or_default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Called synchronously by notify on its event thread.
fn dispatch(routes: &Mutex<Routes>, event: &Event) {
    let deliveries: Vec<(PathBuf, Vec<CallbackSlot>)> = {
        let routes = lock(routes);
        routes
            .targets(event)
            .into_iter()
            .map(|path| {
                let slots = routes.slots(&path);
                (path, slots)
            })
            .collect()
    };

    for (watched, slots) in deliveries {
        let Some(classified) = classify_batch(&watched, std::iter::once(event)) else {
            continue;
        };
        for slot in &slots {
            slot.deliver(classified.clone());
        }
    }
}

impl NotifyBackend {
    pub fn new(config: Config) -> Self {
        Self {
            shared: Arc::new(SharedWatcher {
                config,
                ..SharedWatcher::default()
            }),
        }
    }

    /// Number of distinct directories currently registered with the OS.
    pub fn registered_paths(&self) -> usize {
        lock(&self.shared.routes).by_path.len()
    }

    fn ensure_watcher<'a>(
        &self,
        slot: &'a mut Option<RecommendedWatcher>,
    ) -> notify::Result<&'a mut RecommendedWatcher> {
        if slot.is_none() {
            let routes = Arc::clone(&self.shared.routes);
            let watcher = RecommendedWatcher::new(
                move |res: notify::Result<Event>| match res {
                    Ok(event) => dispatch(&routes, &event),
                    Err(err) => warn!(paths = ?err.paths, "file watch error: {err}"),
                },
                self.shared.config,
            )?;
            debug!("shared notify watcher created");
            *slot = Some(watcher);
        }
        match slot {
            Some(watcher) => Ok(watcher),
            None => Err(notify::Error::generic("shared watcher unavailable")),
        }
    }
}

impl HandleBackend for NotifyBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn DirHandle>> {
        let open_failed = |source: notify::Error| DirwatchError::OpenFailed {
            path: path.to_path_buf(),
            source,
        };

        let meta = std::fs::metadata(path).map_err(|e| open_failed(notify::Error::io(e)))?;
        if !meta.is_dir() {
            return Err(open_failed(
                notify::Error::generic("not a directory").add_path(path.to_path_buf()),
            ));
        }

        let mut guard = lock(&self.shared.watcher);
        let watcher = self.ensure_watcher(&mut guard).map_err(open_failed)?;

        let already_watched = lock(&self.shared.routes).by_path.contains_key(path);
        if !already_watched {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(open_failed)?;
        }

        let slot = CallbackSlot::default();
        let id = {
            let mut routes = lock(&self.shared.routes);
            let id = routes.next_id;
            routes.next_id += 1;
            routes
                .by_path
                .entry(path.to_path_buf())
                .or_default()
                .push((id, slot.clone()));
            id
        };
        drop(guard);

        debug!(path = ?path, "opened directory handle");

        Ok(Box::new(NotifyHandle {
            id,
            path: path.to_path_buf(),
            slot,
            shared: Some(Arc::clone(&self.shared)),
        }))
    }
}

/// One registration on the backend's shared watcher.
pub struct NotifyHandle {
    id: u64,
    path: PathBuf,
    slot: CallbackSlot,
    /// `None` once cancelled.
    shared: Option<Arc<SharedWatcher>>,
}

impl fmt::Debug for NotifyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("open", &self.shared.is_some())
            .finish()
    }
}

impl DirHandle for NotifyHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn arm(&mut self, on_event: EventCallback) {
        if self.shared.is_some() {
            self.slot.install(on_event);
        }
    }

    fn cancel(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        self.slot.clear();

        let mut guard = lock(&shared.watcher);
        let last = {
            let mut routes = lock(&shared.routes);
            match routes.by_path.get_mut(&self.path) {
                Some(slots) => {
                    slots.retain(|(id, _)| *id != self.id);
                    if slots.is_empty() {
                        routes.by_path.remove(&self.path);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if last {
            if let Some(watcher) = guard.as_mut() {
                // Fails when the directory is already gone; the watch died with it.
                if let Err(err) = watcher.unwatch(&self.path) {
                    debug!(path = ?self.path, "unwatch during cancel failed: {err}");
                }
            }
        }
        debug!(path = ?self.path, "directory handle cancelled");
    }

    fn is_open(&self) -> bool {
        self.shared.is_some()
    }
}

impl Drop for NotifyHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
