//! A connection's handle on its channel membership.

use crate::channel::{ChannelId, SubscriberId};
use crate::mailbox::Mailbox;
use crate::message::Message;
use crate::registry::Registry;
use std::sync::Arc;

/// An active subscription to one channel.
///
/// Dropping the subscription unsubscribes it, on every exit path of the
/// code that owns it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    channel: ChannelId,
    mailbox: Arc<Mailbox>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        channel: ChannelId,
        mailbox: Arc<Mailbox>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            id,
            channel,
            mailbox,
            registry,
        }
    }

    /// Get the subscriber ID.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Get the channel this subscription belongs to.
    #[must_use]
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Get the subscriber's mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the subscription was removed or the registry shut down.
    pub async fn recv(&self) -> Option<Message> {
        self.mailbox.recv().await
    }

    /// Take the next message if one is pending.
    pub fn try_recv(&self) -> Option<Message> {
        self.mailbox.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.channel, self.id);
    }
}
