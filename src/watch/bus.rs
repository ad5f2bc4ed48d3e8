// src/watch/bus.rs

//! Publish/subscribe channel for watch events.
//!
//! Nodes subscribe to deletions and renames so a parent can prune a child
//! that detected its own removal. Delivery is synchronous: every handler
//! has run by the time [`EventBus::publish`] returns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::watch::event::{WatchEvent, WatchEventKind};

pub type BusHandler = Arc<dyn Fn(&WatchEvent) + Send + Sync + 'static>;

/// Returned by [`EventBus::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

#[derive(Default)]
struct Subscribers {
    next: u64,
    by_token: BTreeMap<SubscriptionToken, (WatchEventKind, BusHandler)>,
}

/// Cloneable handle to one bus. Clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: WatchEventKind, handler: F) -> SubscriptionToken
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        let mut subs = self.lock();
        let token = SubscriptionToken(subs.next);
        subs.next += 1;
        subs.by_token.insert(token, (kind, Arc::new(handler)));
        token
    }

    /// Returns false if the token was not (or no longer) subscribed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.lock().by_token.remove(&token).is_some()
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Handlers run on the caller's thread, outside the subscriber lock, so
    /// they may subscribe or unsubscribe.
    pub fn publish(&self, event: &WatchEvent) {
        let kind = event.kind();
        let handlers: Vec<BusHandler> = self
            .lock()
            .by_token
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| Arc::clone(h))
            .collect();

        trace!(?event, receivers = handlers.len(), "publishing bus event");
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().by_token.len()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
