//! Synchronous publish/subscribe between the writer and its listeners.
//!
//! Handlers run on the publisher's thread, in registration order, before
//! `publish` returns. Listeners subscribe when they are constructed and
//! unsubscribe when they stop, so the bus itself holds no global state.

mod event;

pub use event::{Event, EventKind};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use smallvec::SmallVec;

type Handler = Arc<dyn Fn(&Event<'_>) + Send + Sync>;

/// Handle returned by [`NotificationCenter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Event dispatch object shared (via `Arc`) by the writer and listeners.
pub struct NotificationCenter {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `handler` for every event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() < before
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// Handlers are collected first and called without the lock held, so a
    /// handler may itself subscribe or unsubscribe.
    pub fn publish(&self, event: &Event<'_>) {
        let kind = event.kind();
        let handlers: SmallVec<[Handler; 4]> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
