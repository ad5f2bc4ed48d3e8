mod common;
use crate::common::builders::MockTreeBuilder;
use crate::common::with_timeout;

use std::path::Path;
use std::sync::{Arc, Mutex};

use dirwatch::watch::{DelegateSink, HandleEvent, Node, WatchDelegate};

#[derive(Default)]
struct RecordingDelegate {
    calls: Mutex<Vec<String>>,
}

impl RecordingDelegate {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl WatchDelegate for RecordingDelegate {
    fn files_changed(&self, path: &Path) {
        self.calls.lock().unwrap().push(format!("changed {}", path.display()));
    }

    fn directory_deleted(&self, path: &Path) {
        self.calls.lock().unwrap().push(format!("deleted {}", path.display()));
    }

    fn directory_renamed(&self, from: &Path, to: Option<&Path>) {
        let to = to.map(|p| p.display().to_string()).unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push(format!("renamed {} -> {to}", from.display()));
    }
}

#[tokio::test]
async fn delegate_task_sees_events_in_order_and_ends_with_the_tree() {
    let tree = MockTreeBuilder::new().dir("a").dir("b").build();
    let delegate = Arc::new(RecordingDelegate::default());
    let (sink, task) = DelegateSink::spawn_delegate(delegate.clone());

    let root = Node::with_context(tree.path(""), true, tree.ctx.clone()).with_sink(sink);
    assert!(root.start());

    tree.backend.emit(tree.path("a"), HandleEvent::Changed);
    tree.backend.emit(tree.path("b"), HandleEvent::RenamedTo(None));
    tree.backend.emit(tree.path("a"), HandleEvent::Deleted);
    tree.ctx.executor().drain().unwrap();

    // Every sink clone lives in the tree, so the task ends once it is gone.
    drop(root);
    with_timeout(task).await.unwrap();

    assert_eq!(
        delegate.calls(),
        vec![
            "changed /mock/a".to_string(),
            "renamed /mock/b -> ".to_string(),
            "deleted /mock/a".to_string(),
        ]
    );
}

#[tokio::test]
async fn stream_drive_runs_on_the_consumer_task() {
    let tree = MockTreeBuilder::new().build();
    let (sink, stream) = DelegateSink::channel();
    let root = Node::with_context(tree.path(""), false, tree.ctx.clone()).with_sink(sink);
    assert!(root.start());

    tree.backend.emit(tree.path(""), HandleEvent::Changed);
    tree.ctx.executor().drain().unwrap();
    drop(root);

    let delegate = RecordingDelegate::default();
    with_timeout(stream.drive(&delegate)).await;
    assert_eq!(delegate.calls(), vec!["changed /mock".to_string()]);
}
