//! Observer registry for inbound messages

use super::types::InboundMessage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Callback invoked for every inbound message
pub type Observer = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

#[derive(Clone)]
struct Entry {
    id: u64,
    /// Cleared on unsubscribe, so an in-flight dispatch can skip the entry
    live: Arc<AtomicBool>,
    observer: Observer,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Observers in subscription order, keyed by the id handed out on subscribe
#[derive(Clone, Default)]
pub struct ObserverSet {
    inner: Arc<Mutex<Registry>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and return the handle that removes it
    pub fn subscribe(&self, observer: Observer) -> Subscription {
        let mut registry = self.inner.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push(Entry {
            id,
            live: Arc::new(AtomicBool::new(true)),
            observer,
        });

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `message` to every observer, in subscription order.
    ///
    /// The lock is released while callbacks run. An observer removed by an
    /// earlier callback in the same dispatch is skipped.
    pub fn dispatch(&self, message: &InboundMessage) -> usize {
        let snapshot: Vec<Entry> = self.inner.lock().entries.clone();

        let mut delivered = 0;
        for entry in snapshot {
            if !entry.live.load(Ordering::Acquire) {
                continue;
            }
            (entry.observer)(message);
            delivered += 1;
        }
        delivered
    }
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to stop
/// receiving messages. Dropping the handle keeps the observer registered.
#[must_use = "keep the subscription to be able to unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove exactly this observer. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock();
        let Some(index) = registry.entries.iter().position(|e| e.id == self.id) else {
            return false;
        };
        let entry = registry.entries.remove(index);
        entry.live.store(false, Ordering::Release);
        true
    }
}
