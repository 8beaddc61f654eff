//! Ring change subscriptions.
//!
//! Each subscriber owns the receiving half of an unbounded channel. A new
//! ring is sent to every subscriber in registration order. Sends never block
//! and never drop an update, so subscribers are expected to drain their
//! receiver promptly. A subscriber whose receiver is gone is pruned on the
//! next publish.

use std::fmt;

use tokio::sync::mpsc;

use crate::ring::RingView;

/// Identifies a ring subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw u64 value of this subscription ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered subscription: its ID and the stream of new rings.
pub struct RingSubscription {
    /// ID to pass back when unsubscribing.
    pub id: SubscriptionId,
    /// Receives every ring installed after the subscription was made.
    pub receiver: mpsc::UnboundedReceiver<RingView>,
}

impl fmt::Debug for RingSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The set of ring subscribers, in registration order.
#[derive(Debug, Default)]
pub struct RingWatchers {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<RingView>)>,
}

impl RingWatchers {
    /// Creates an empty subscriber set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber and returns its subscription.
    pub fn subscribe(&mut self) -> RingSubscription {
        let (tx, receiver) = mpsc::unbounded_channel();
        let id = self.attach(tx);
        RingSubscription { id, receiver }
    }

    /// Adds an existing sender as a subscriber.
    pub fn attach(&mut self, sender: mpsc::UnboundedSender<RingView>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, sender));
        tracing::debug!(subscription = %id, "ring subscriber added");
        id
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        let removed = self.subscribers.len() != before;
        if removed {
            tracing::debug!(subscription = %id, "ring subscriber removed");
        }
        removed
    }

    /// Sends `ring` to every live subscriber in registration order.
    /// Returns the number of subscribers that received it.
    pub fn publish(&mut self, ring: &RingView) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|(id, tx)| match tx.send(ring.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(subscription = %id, "ring subscriber closed, pruning");
                false
            }
        });
        delivered
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns true if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
