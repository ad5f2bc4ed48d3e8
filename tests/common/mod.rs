#![allow(dead_code)]

pub use dirwatch_test_utils::builders;
pub use dirwatch_test_utils::{init_tracing, wait_until, with_timeout};

use std::path::PathBuf;

use dirwatch::watch::{EventStream, WatchEvent};

pub fn changed(path: impl Into<PathBuf>) -> WatchEvent {
    WatchEvent::FilesChanged { path: path.into() }
}

pub fn deleted(path: impl Into<PathBuf>) -> WatchEvent {
    WatchEvent::DirectoryDeleted { path: path.into() }
}

pub fn renamed(from: impl Into<PathBuf>, to: Option<PathBuf>) -> WatchEvent {
    WatchEvent::DirectoryRenamed {
        from: from.into(),
        to,
    }
}

/// Everything queued on the stream right now.
pub fn take_events(stream: &mut EventStream) -> Vec<WatchEvent> {
    stream.drain()
}
