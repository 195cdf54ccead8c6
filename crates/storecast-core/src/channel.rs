//! Channel abstraction for storecast.
//!
//! A channel is one store's broadcast group: the mailboxes of every
//! connected subscriber plus the handle of its snapshot producer.

use crate::mailbox::Mailbox;
use crate::producer::ProducerHandle;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A channel identifier.
pub type ChannelId = u64;

static SUBSCRIBER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a new process-unique subscriber ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(SUBSCRIBER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{:x}", self.0)
    }
}

impl From<u64> for SubscriberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A channel's membership and producer.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    subscribers: HashMap<SubscriberId, Arc<Mailbox>>,
    pub(crate) producer: Option<ProducerHandle>,
}

impl Channel {
    /// Create an empty channel.
    #[must_use]
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            subscribers: HashMap::new(),
            producer: None,
        }
    }

    /// Get the channel ID.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if the channel has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Check if the producer is running.
    #[must_use]
    pub fn is_producer_running(&self) -> bool {
        self.producer.as_ref().is_some_and(ProducerHandle::is_running)
    }

    /// Add a subscriber's mailbox.
    ///
    /// Returns `true` if the channel was empty before the call.
    pub(crate) fn add(&mut self, subscriber: SubscriberId, mailbox: Arc<Mailbox>) -> bool {
        let was_empty = self.subscribers.is_empty();
        self.subscribers.insert(subscriber, mailbox);
        debug!(
            channel = self.id,
            subscriber = %subscriber,
            subscribers = self.subscribers.len(),
            "Subscriber added"
        );
        was_empty
    }

    /// Remove a subscriber.
    ///
    /// Returns the mailbox if the subscriber was present.
    pub(crate) fn remove(&mut self, subscriber: SubscriberId) -> Option<Arc<Mailbox>> {
        let removed = self.subscribers.remove(&subscriber);
        if removed.is_some() {
            debug!(
                channel = self.id,
                subscriber = %subscriber,
                subscribers = self.subscribers.len(),
                "Subscriber removed"
            );
        }
        removed
    }

    /// Remove every subscriber, returning their mailboxes.
    pub(crate) fn drain(&mut self) -> Vec<Arc<Mailbox>> {
        self.subscribers.drain().map(|(_, mailbox)| mailbox).collect()
    }

    /// Iterate over the current mailboxes.
    pub(crate) fn mailboxes(&self) -> impl Iterator<Item = &Arc<Mailbox>> {
        self.subscribers.values()
    }
}
