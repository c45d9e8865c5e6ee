//! Subscription and notification layer.
//!
//! The store has a single writer and many passive observers. Observers
//! register a callback and receive the latest [`CacheSnapshot`] synchronously
//! after every settle point. Dropping the returned [`Subscription`]
//! unregisters the callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::snapshot::CacheSnapshot;

type Callback = Arc<dyn Fn(&CacheSnapshot) + Send + Sync>;

/// Registered callbacks, in registration order.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    pub(crate) fn register<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&CacheSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(callback)));
        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    fn unregister(&self, id: u64) {
        self.subscribers
            .lock()
            .retain(|(subscriber_id, _)| *subscriber_id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Calls every registered callback with `snapshot`.
    ///
    /// The registry lock is released before the callbacks run, so a callback
    /// may drop its own subscription.
    pub(crate) fn notify(&self, snapshot: &CacheSnapshot) {
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        tracing::trace!(
            revision = snapshot.revision(),
            subscribers = callbacks.len(),
            "Notifying cache subscribers"
        );
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Handle for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    id: u64,
}

impl Subscription {
    /// Unsubscribes explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}
