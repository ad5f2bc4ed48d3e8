// src/watch/node.rs

//! The recursive watcher tree.
//!
//! A [`Node`] watches one directory. With `auto_recurse` it also owns one
//! child node per subdirectory, discovered by rescanning the directory on
//! start and on every change notification. Ownership flows strictly from
//! parent to child: children live in their parent's map, while parent links,
//! handle callbacks and bus handlers only hold `Weak` references.
//!
//! Every mutation of a node (start, stop, rescan, pruning, event reactions)
//! runs on the context's [`MutationExecutor`](crate::watch::MutationExecutor).
//! Reads through the accessors are best-effort snapshots.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, trace, warn};

use crate::fs::normalize_path;
use crate::watch::bus::SubscriptionToken;
use crate::watch::context::WatchContext;
use crate::watch::event::{HandleEvent, WatchEvent, WatchEventKind};
use crate::watch::handle::{DirHandle, EventCallback};
use crate::watch::sink::DelegateSink;

/// Root of a watcher tree, owned by the consumer.
///
/// Dropping it stops the whole tree.
pub struct Node {
    inner: Arc<NodeInner>,
}

/// Non-owning reference to a node anywhere in a tree.
///
/// Accessors return neutral values once the node has been torn down.
#[derive(Clone)]
pub struct NodeRef {
    path: PathBuf,
    node: Weak<NodeInner>,
}

struct NodeInner {
    path: PathBuf,
    auto_recurse: bool,
    ctx: WatchContext,
    state: Mutex<NodeState>,
    subscriptions: Mutex<Vec<SubscriptionToken>>,
}

#[derive(Default)]
struct NodeState {
    monitoring: bool,
    /// Bumped on every successful start; events from older sessions are dropped.
    session: u64,
    parent: Weak<NodeInner>,
    children: HashMap<PathBuf, Arc<NodeInner>>,
    known_subdirs: HashSet<PathBuf>,
    handle: Option<Box<dyn DirHandle>>,
    sink: Option<DelegateSink>,
}

impl Node {
    /// Create an idle root node on the process-wide context.
    ///
    /// No I/O happens until [`Node::start`].
    pub fn new(path: impl AsRef<Path>, auto_recurse: bool) -> Self {
        Self::with_context(path, auto_recurse, WatchContext::global())
    }

    pub fn with_context(path: impl AsRef<Path>, auto_recurse: bool, ctx: WatchContext) -> Self {
        let path = normalize_path(path.as_ref());
        Self {
            inner: NodeInner::create(path, auto_recurse, ctx, None),
        }
    }

    /// Builder form of [`Node::set_sink`].
    pub fn with_sink(self, sink: DelegateSink) -> Self {
        self.set_sink(Some(sink));
        self
    }

    /// Attach (or detach) the consumer's sink. Applies to this node, every
    /// existing descendant, and every descendant created later.
    pub fn set_sink(&self, sink: Option<DelegateSink>) {
        let inner = Arc::clone(&self.inner);
        if let Err(err) = self.inner.ctx.executor().run(move || inner.set_sink_now(sink)) {
            warn!(path = ?self.inner.path, "cannot attach sink: {err}");
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn auto_recurse(&self) -> bool {
        self.inner.auto_recurse
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.is_monitoring()
    }

    /// Always `None` for a consumer-created root.
    pub fn parent(&self) -> Option<NodeRef> {
        self.inner.parent_ref()
    }

    pub fn context(&self) -> &WatchContext {
        &self.inner.ctx
    }

    pub fn as_node_ref(&self) -> NodeRef {
        NodeRef::to(&self.inner)
    }

    /// Paths of the direct children, sorted.
    pub fn child_paths(&self) -> Vec<PathBuf> {
        self.inner.child_paths()
    }

    /// Paths this node currently tracks as subdirectories, sorted.
    pub fn known_subdirectories(&self) -> Vec<PathBuf> {
        self.inner.known_subdirectories()
    }

    pub fn child(&self, path: impl AsRef<Path>) -> Option<NodeRef> {
        self.inner.child_ref(path.as_ref())
    }

    /// Every node below this one, parents before children.
    pub fn descendants(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack = self.inner.child_refs();
        stack.reverse();
        while let Some(node) = stack.pop() {
            let mut children = node.child_refs();
            children.reverse();
            stack.extend(children);
            out.push(node);
        }
        out
    }

    /// Start watching. Returns true if the node is monitoring afterwards.
    ///
    /// Calling it on a node that is already monitoring changes nothing.
    pub fn start(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        match self.inner.ctx.executor().run(move || inner.start_now()) {
            Ok(true) => {
                info!(path = ?self.inner.path, auto_recurse = self.inner.auto_recurse, "watcher started");
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(path = ?self.inner.path, "cannot start watcher: {err}");
                false
            }
        }
    }

    /// Stop watching this node and tear down its whole subtree.
    ///
    /// When this returns, no node of the subtree is monitoring.
    pub fn stop(&self) {
        if !self.inner.is_monitoring() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        match self.inner.ctx.executor().run(move || inner.stop_now()) {
            Ok(()) => info!(path = ?self.inner.path, "watcher stopped"),
            Err(err) => warn!(path = ?self.inner.path, "cannot stop watcher: {err}"),
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.inner.path)
            .field("auto_recurse", &self.inner.auto_recurse)
            .field("monitoring", &self.inner.is_monitoring())
            .finish_non_exhaustive()
    }
}

impl NodeRef {
    fn to(node: &Arc<NodeInner>) -> Self {
        Self {
            path: node.path.clone(),
            node: Arc::downgrade(node),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False once the node has been removed from its tree.
    pub fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }

    pub fn is_monitoring(&self) -> bool {
        self.node.upgrade().map(|n| n.is_monitoring()).unwrap_or(false)
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.node.upgrade().and_then(|n| n.parent_ref())
    }

    pub fn child_paths(&self) -> Vec<PathBuf> {
        self.node.upgrade().map(|n| n.child_paths()).unwrap_or_default()
    }

    pub fn known_subdirectories(&self) -> Vec<PathBuf> {
        self.node
            .upgrade()
            .map(|n| n.known_subdirectories())
            .unwrap_or_default()
    }

    pub fn child(&self, path: impl AsRef<Path>) -> Option<NodeRef> {
        self.node.upgrade().and_then(|n| n.child_ref(path.as_ref()))
    }

    fn child_refs(&self) -> Vec<NodeRef> {
        self.node.upgrade().map(|n| n.child_refs()).unwrap_or_default()
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.path)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl NodeInner {
    fn create(
        path: PathBuf,
        auto_recurse: bool,
        ctx: WatchContext,
        sink: Option<DelegateSink>,
    ) -> Arc<Self> {
        let node = Arc::new(NodeInner {
            path,
            auto_recurse,
            ctx,
            state: Mutex::new(NodeState {
                sink,
                ..NodeState::default()
            }),
            subscriptions: Mutex::new(Vec::new()),
        });

        let tokens: Vec<SubscriptionToken> = [WatchEventKind::DirectoryDeleted, WatchEventKind::DirectoryRenamed]
            .into_iter()
            .map(|kind| {
                let weak = Arc::downgrade(&node);
                node.ctx.bus().subscribe(kind, move |event| {
                    if let Some(node) = weak.upgrade() {
                        node.on_bus_event(event);
                    }
                })
            })
            .collect();
        *node.lock_subscriptions() = tokens;

        node
    }

    fn lock_state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Vec<SubscriptionToken>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_monitoring(&self) -> bool {
        self.lock_state().monitoring
    }

    fn parent_ref(&self) -> Option<NodeRef> {
        self.lock_state().parent.upgrade().map(|p| NodeRef::to(&p))
    }

    fn child_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock_state().children.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn known_subdirectories(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock_state().known_subdirs.iter().cloned().collect();
        paths.sort();
        paths
    }

    fn child_ref(&self, path: &Path) -> Option<NodeRef> {
        self.lock_state().children.get(path).map(NodeRef::to)
    }

    fn child_refs(&self) -> Vec<NodeRef> {
        let mut refs: Vec<NodeRef> = self.lock_state().children.values().map(NodeRef::to).collect();
        refs.sort_by(|a, b| a.path.cmp(&b.path));
        refs
    }

    // --- everything below runs on the mutation executor ---

    fn set_sink_now(&self, sink: Option<DelegateSink>) {
        let children: Vec<Arc<NodeInner>> = {
            let mut state = self.lock_state();
            state.sink = sink.clone();
            state.children.values().cloned().collect()
        };
        for child in children {
            child.set_sink_now(sink.clone());
        }
    }

    fn start_now(self: &Arc<Self>) -> bool {
        if self.is_monitoring() {
            return true;
        }

        let handle = match self.ctx.backend().open(&self.path) {
            Ok(handle) => handle,
            Err(err) => {
                debug!(path = ?self.path, "cannot open directory handle: {err}");
                return false;
            }
        };

        let session = {
            let mut state = self.lock_state();
            state.handle = Some(handle);
            state.monitoring = true;
            state.session += 1;
            state.session
        };

        if self.auto_recurse {
            self.rescan();
        }

        let callback = self.event_callback(session);
        if let Some(handle) = self.lock_state().handle.as_mut() {
            handle.arm(callback);
        }

        debug!(path = ?self.path, session, "node monitoring");
        true
    }

    fn stop_now(&self) {
        let (children, handle) = {
            let mut state = self.lock_state();
            if !state.monitoring {
                return;
            }
            state.parent = Weak::new();
            state.known_subdirs.clear();
            (std::mem::take(&mut state.children), state.handle.take())
        };

        let mut children: Vec<(PathBuf, Arc<NodeInner>)> = children.into_iter().collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, child) in children {
            child.stop_now();
        }

        if let Some(mut handle) = handle {
            handle.cancel();
        }
        self.lock_state().monitoring = false;

        debug!(path = ?self.path, "node stopped");
    }

    /// Start a child node for every subdirectory that appeared since the last
    /// pass. Subdirectories that vanished are left alone; those are pruned
    /// only through deletion and rename events.
    fn rescan(self: &Arc<Self>) {
        if !self.auto_recurse {
            return;
        }

        let listing = match self.ctx.fs().list_subdirectories(&self.path) {
            Ok(dirs) => dirs,
            Err(err) => {
                debug!(path = ?self.path, "rescan listing failed; treating as empty: {err:#}");
                return;
            }
        };

        let (fresh, sink) = {
            let state = self.lock_state();
            if !state.monitoring {
                return;
            }
            let mut fresh: Vec<PathBuf> = listing
                .into_iter()
                .filter(|p| !state.known_subdirs.contains(p))
                .filter(|p| !self.ctx.exclude().is_excluded(p))
                .collect();
            fresh.sort();
            fresh.dedup();
            (fresh, state.sink.clone())
        };

        for child_path in fresh {
            let child = NodeInner::create(
                child_path.clone(),
                self.auto_recurse,
                self.ctx.clone(),
                sink.clone(),
            );
            child.lock_state().parent = Arc::downgrade(self);

            if child.start_now() {
                let mut state = self.lock_state();
                state.known_subdirs.insert(child_path.clone());
                state.children.insert(child_path, child);
            } else {
                warn!(parent = ?self.path, child = ?child_path, "child watcher did not start; skipping");
            }
        }
    }

    /// Callback armed on this node's handle for one session. It only queues
    /// work on the executor, never touches the tree itself.
    fn event_callback(self: &Arc<Self>, session: u64) -> EventCallback {
        let weak = Arc::downgrade(self);
        let executor = self.ctx.executor().clone();
        let path = self.path.clone();

        Box::new(move |event: HandleEvent| {
            let weak = weak.clone();
            let submitted = executor.submit(move || {
                if let Some(node) = weak.upgrade() {
                    node.handle_event(session, event);
                }
            });
            if submitted.is_err() {
                warn!(path = ?path, "mutation executor unavailable; dropping event");
            }
        })
    }

    fn handle_event(self: &Arc<Self>, session: u64, event: HandleEvent) {
        {
            let state = self.lock_state();
            if !state.monitoring || state.session != session {
                trace!(path = ?self.path, ?event, "dropping event from a finished session");
                return;
            }
        }

        match event {
            HandleEvent::Deleted => {
                debug!(path = ?self.path, "watched directory deleted");
                self.stop_now();
                self.emit(WatchEvent::DirectoryDeleted {
                    path: self.path.clone(),
                });
            }
            HandleEvent::RenamedTo(to) => {
                debug!(path = ?self.path, to = ?to, "watched directory renamed");
                self.emit(WatchEvent::DirectoryRenamed {
                    from: self.path.clone(),
                    to,
                });
            }
            HandleEvent::Changed => {
                self.rescan();
                self.emit(WatchEvent::FilesChanged {
                    path: self.path.clone(),
                });
            }
        }
    }

    /// Hand the event to the consumer's sink, then to the bus.
    fn emit(&self, event: WatchEvent) {
        let sink = self.lock_state().sink.clone();
        if let Some(sink) = sink {
            sink.dispatch(event.clone());
        }
        self.ctx.bus().publish(&event);
    }

    fn on_bus_event(self: &Arc<Self>, event: &WatchEvent) {
        let subject = event.subject().to_path_buf();
        let node = Arc::clone(self);
        if let Err(err) = self.ctx.executor().run(move || node.prune_child(&subject)) {
            warn!(path = ?self.path, "cannot prune child after bus event: {err}");
        }
    }

    fn prune_child(&self, subject: &Path) {
        let removed = {
            let mut state = self.lock_state();
            if !state.known_subdirs.remove(subject) {
                return;
            }
            state.children.remove(subject)
        };

        debug!(parent = ?self.path, child = ?subject, "pruning child watcher");
        if let Some(child) = removed {
            if child.is_monitoring() {
                child.stop_now();
            }
        }
    }
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        let tokens = std::mem::take(
            self.subscriptions
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for token in tokens {
            self.ctx.bus().unsubscribe(token);
        }

        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut handle) = state.handle.take() {
            handle.cancel();
        }
    }
}
