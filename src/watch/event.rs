// src/watch/event.rs

//! Event types flowing out of handles, over the bus and into delegate sinks.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Classification of one OS notification batch for a single watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    /// Something inside the directory changed.
    Changed,
    /// The directory itself was deleted.
    Deleted,
    /// The directory itself was renamed. `None` when the OS did not tell us
    /// where it went.
    RenamedTo(Option<PathBuf>),
}

impl HandleEvent {
    fn priority(&self) -> u8 {
        match self {
            HandleEvent::Deleted => 2,
            HandleEvent::RenamedTo(_) => 1,
            HandleEvent::Changed => 0,
        }
    }

    /// Combine two classifications from the same batch.
    ///
    /// Deleted wins over RenamedTo, which wins over Changed.
    pub fn merge(self, other: HandleEvent) -> HandleEvent {
        if other.priority() > self.priority() {
            other
        } else {
            self
        }
    }
}

/// The observable events, as delivered to delegate sinks and published on
/// the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    FilesChanged {
        path: PathBuf,
    },
    DirectoryDeleted {
        path: PathBuf,
    },
    DirectoryRenamed {
        from: PathBuf,
        to: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    FilesChanged,
    DirectoryDeleted,
    DirectoryRenamed,
}

impl WatchEvent {
    pub fn kind(&self) -> WatchEventKind {
        match self {
            WatchEvent::FilesChanged { .. } => WatchEventKind::FilesChanged,
            WatchEvent::DirectoryDeleted { .. } => WatchEventKind::DirectoryDeleted,
            WatchEvent::DirectoryRenamed { .. } => WatchEventKind::DirectoryRenamed,
        }
    }

    /// The directory the event is about (the old path for renames).
    pub fn subject(&self) -> &Path {
        match self {
            WatchEvent::FilesChanged { path } | WatchEvent::DirectoryDeleted { path } => path,
            WatchEvent::DirectoryRenamed { from, .. } => from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_outranks_rename_and_change() {
        let renamed = HandleEvent::RenamedTo(None);
        assert_eq!(HandleEvent::Changed.merge(renamed.clone()), renamed);
        assert_eq!(renamed.clone().merge(HandleEvent::Deleted), HandleEvent::Deleted);
        assert_eq!(HandleEvent::Deleted.merge(HandleEvent::Changed), HandleEvent::Deleted);
        assert_eq!(renamed.clone().merge(HandleEvent::Changed), renamed);
    }

    #[test]
    fn rename_subject_is_old_path() {
        let ev = WatchEvent::DirectoryRenamed {
            from: PathBuf::from("/r/a"),
            to: Some(PathBuf::from("/r/b")),
        };
        assert_eq!(ev.subject(), Path::new("/r/a"));
        assert_eq!(ev.kind(), WatchEventKind::DirectoryRenamed);
    }
}
