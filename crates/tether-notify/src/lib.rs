//! Tether Notify - publisher/subscriber fan-out
//!
//! A simple, independent notification mechanism: a [`Publisher`] keeps weak
//! references to its subscribers and dispatches synchronously in
//! subscription order. Dropping a [`Subscription`] guard unsubscribes; dead
//! subscribers are pruned on the next publish. This crate knows nothing
//! about the binding engine — containers compose the two.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// A subscriber callback
pub type Callback<T> = dyn Fn(&T) + Send + Sync;

/// Stable identifier for one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription:{}", self.0)
    }
}

/// RAII guard owning the strong reference behind one subscription
///
/// The publisher only holds a weak reference, so dropping this guard (or
/// calling [`Subscription::cancel`]) ends the subscription.
pub struct Subscription<T> {
    id: SubscriptionId,
    _callback: Arc<Callback<T>>,
}

impl<T> Subscription<T> {
    /// The id the publisher knows this subscription by
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Consume the guard, ending the subscription
    pub fn cancel(self) {}
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Fan-out of values to weakly-held subscribers
pub struct Publisher<T> {
    subscribers: Vec<(SubscriptionId, Weak<Callback<T>>)>,
    next: u64,
}

impl<T> Publisher<T> {
    /// Create a publisher with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next: 0,
        }
    }

    /// Register a subscriber and return the guard keeping it alive
    pub fn subscribe(&mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let strong: Arc<Callback<T>> = Arc::new(callback);
        let id = SubscriptionId(self.next);
        self.next += 1;
        self.subscribers.push((id, Arc::downgrade(&strong)));
        Subscription {
            id,
            _callback: strong,
        }
    }

    /// Remove a subscriber by id; returns true if it was present
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Dispatch a value to every live subscriber, in subscription order
    ///
    /// Subscribers whose guard has been dropped are pruned as a side effect.
    pub fn publish(&mut self, value: &T) {
        self.subscribers.retain(|(_, weak)| match weak.upgrade() {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        });
    }

    /// Number of currently live subscribers
    pub fn len(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Check whether no live subscriber remains
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("subscribers", &self.len())
            .finish()
    }
}
