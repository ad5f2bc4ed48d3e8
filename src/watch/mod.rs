// src/watch/mod.rs

//! Recursive directory watching.
//!
//! This module is responsible for:
//! - Owning one OS watch registration per directory ([`handle`]) and
//!   classifying raw `notify` events into changed / deleted / renamed
//!   ([`classify`]).
//! - Maintaining the live tree of per-directory watchers ([`node`]).
//! - Serialising every tree mutation on a single worker ([`executor`]).
//! - Broadcasting deletions and renames between nodes ([`bus`]).
//! - Handing the observable events to the consumer ([`sink`]).
//!
//! It reports *that* a directory changed, never *what* changed inside it.

pub mod bus;
pub mod classify;
pub mod context;
pub mod event;
pub mod executor;
pub mod handle;
pub mod mock;
pub mod node;
pub mod patterns;
pub mod sink;

pub use bus::{EventBus, SubscriptionToken};
pub use context::WatchContext;
pub use event::{HandleEvent, WatchEvent, WatchEventKind};
pub use executor::MutationExecutor;
pub use handle::{DirHandle, HandleBackend, NotifyBackend};
pub use node::{Node, NodeRef};
pub use patterns::ExcludeSet;
pub use sink::{deliver_to, DelegateSink, EventStream, WatchDelegate};
