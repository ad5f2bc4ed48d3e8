// src/watch/classify.rs

//! Turn raw `notify` events into [`HandleEvent`]s for one watched directory.

use std::path::Path;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Event;

use crate::watch::event::HandleEvent;

/// Classify a single notify event relative to the watched directory `watched`.
///
/// Returns `None` for events that carry no change (access notifications).
pub fn classify(watched: &Path, event: &Event) -> Option<HandleEvent> {
    let names_watched = event.paths.iter().any(|p| p == watched);

    match &event.kind {
        EventKind::Access(_) => None,
        EventKind::Remove(_) if names_watched => Some(HandleEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(mode))
            if event.paths.first().map(|p| p == watched).unwrap_or(false) =>
        {
            let to = match mode {
                RenameMode::Both => event.paths.get(1).filter(|p| *p != watched).cloned(),
                _ => None,
            };
            Some(HandleEvent::RenamedTo(to))
        }
        _ => Some(HandleEvent::Changed),
    }
}

/// Classify a batch of notify events, keeping the highest-priority result.
pub fn classify_batch<'a, I>(watched: &Path, events: I) -> Option<HandleEvent>
where
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .filter_map(|event| classify(watched, event))
        .reduce(HandleEvent::merge)
}
