//! Message types delivered to subscribers.

use crate::channel::ChannelId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A unique message identifier.
pub type MessageId = u64;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Pushed by an external caller.
    Push,
    /// Periodic snapshot from the channel's producer.
    Snapshot,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Push => f.write_str("push"),
            Origin::Snapshot => f.write_str("snapshot"),
        }
    }
}

/// A message queued for delivery.
///
/// The payload is shared, so fanning one message out to many mailboxes only
/// bumps a reference count.
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Target channel.
    pub channel: ChannelId,
    /// Which path produced the message.
    pub origin: Origin,
    /// Text payload.
    pub payload: Arc<str>,
}

impl Message {
    /// Create a new message.
    #[must_use]
    pub fn new(channel: ChannelId, origin: Origin, payload: impl Into<Arc<str>>) -> Self {
        Self {
            id: generate_message_id(),
            channel,
            origin,
            payload: payload.into(),
        }
    }

    /// Create an externally pushed message.
    #[must_use]
    pub fn push(channel: ChannelId, payload: impl Into<Arc<str>>) -> Self {
        Self::new(channel, Origin::Push, payload)
    }

    /// Create a snapshot message.
    #[must_use]
    pub fn snapshot(channel: ChannelId, payload: impl Into<Arc<str>>) -> Self {
        Self::new(channel, Origin::Snapshot, payload)
    }

    /// Get the payload text.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}
