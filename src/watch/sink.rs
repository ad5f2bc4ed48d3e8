// src/watch/sink.rs

//! Consumer-facing delivery of watch events.
//!
//! Nodes never call consumer code directly. They push [`WatchEvent`]s into a
//! [`DelegateSink`], and the consumer pulls them from the paired
//! [`EventStream`] on whatever task or thread it designates, optionally
//! routing them into a [`WatchDelegate`]. Pushing never blocks, so the
//! mutation executor is never held up by a slow consumer.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::watch::event::WatchEvent;

/// Observer of the three watch events.
pub trait WatchDelegate: Send + Sync {
    fn files_changed(&self, path: &Path);
    fn directory_deleted(&self, path: &Path);
    /// `to` is `None` when the new location could not be determined.
    fn directory_renamed(&self, from: &Path, to: Option<&Path>);
}

/// Route one event to the matching delegate method.
pub fn deliver_to(delegate: &dyn WatchDelegate, event: &WatchEvent) {
    match event {
        WatchEvent::FilesChanged { path } => delegate.files_changed(path),
        WatchEvent::DirectoryDeleted { path } => delegate.directory_deleted(path),
        WatchEvent::DirectoryRenamed { from, to } => {
            delegate.directory_renamed(from, to.as_deref())
        }
    }
}

/// Sending half, copied into every node of a tree. Holding one does not
/// keep the consumer alive: once the stream is dropped, events are discarded.
#[derive(Debug, Clone)]
pub struct DelegateSink {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl DelegateSink {
    pub fn channel() -> (DelegateSink, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (DelegateSink { tx }, EventStream { rx })
    }

    /// Spawn a task on the current Tokio runtime that feeds every event to
    /// `delegate`. The task ends when every sink clone has been dropped.
    pub fn spawn_delegate(delegate: Arc<dyn WatchDelegate>) -> (DelegateSink, JoinHandle<()>) {
        let (sink, stream) = Self::channel();
        let handle = tokio::spawn(async move {
            stream.drive(delegate.as_ref()).await;
        });
        (sink, handle)
    }

    /// Returns false if the consumer has gone away.
    pub fn dispatch(&self, event: WatchEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(err) => {
                debug!(event = ?err.0, "delegate stream closed; dropping event");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, owned by the consumer.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<WatchEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<WatchEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Feed events to `delegate` until every sink has been dropped.
    pub async fn drive(mut self, delegate: &dyn WatchDelegate) {
        while let Some(event) = self.rx.recv().await {
            deliver_to(delegate, &event);
        }
        debug!("delegate stream finished");
    }
}
