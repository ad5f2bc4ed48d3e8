// src/watch/context.rs

//! Collaborators shared by every node of a watcher tree.

use std::sync::{Arc, OnceLock};

use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::bus::EventBus;
use crate::watch::executor::MutationExecutor;
use crate::watch::handle::{HandleBackend, NotifyBackend};
use crate::watch::patterns::ExcludeSet;

/// Everything a node needs besides its own path.
///
/// Cloning is cheap; children receive a clone of their parent's context, so
/// a whole tree always shares one executor, one bus and one backend.
#[derive(Debug, Clone)]
pub struct WatchContext {
    executor: MutationExecutor,
    bus: EventBus,
    backend: Arc<dyn HandleBackend>,
    fs: Arc<dyn FileSystem>,
    exclude: ExcludeSet,
}

static GLOBAL: OnceLock<(MutationExecutor, EventBus, NotifyBackend)> = OnceLock::new();

impl WatchContext {
    /// The process-wide executor, bus and notify backend.
    pub fn global() -> Self {
        let (executor, bus, backend) = GLOBAL.get_or_init(|| {
            (
                MutationExecutor::spawn("dirwatch-mutations"),
                EventBus::new(),
                NotifyBackend::default(),
            )
        });
        Self::with_parts(executor.clone(), bus.clone(), backend.clone())
    }

    /// A fresh executor, bus and notify backend that no other context shares.
    pub fn isolated() -> Self {
        Self::with_parts(
            MutationExecutor::spawn("dirwatch-mutations-isolated"),
            EventBus::new(),
            NotifyBackend::default(),
        )
    }

    fn with_parts(executor: MutationExecutor, bus: EventBus, backend: NotifyBackend) -> Self {
        Self {
            executor,
            bus,
            backend: Arc::new(backend),
            fs: Arc::new(RealFileSystem),
            exclude: ExcludeSet::default(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn HandleBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Subdirectories matching `exclude` are never auto-watched.
    pub fn with_exclude(mut self, exclude: ExcludeSet) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn backend(&self) -> &dyn HandleBackend {
        self.backend.as_ref()
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn exclude(&self) -> &ExcludeSet {
        &self.exclude
    }
}
