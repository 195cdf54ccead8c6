//! Fan-out of one message to every mailbox of a channel.
//!
//! Pushes from the HTTP surface and snapshots from the producer both go
//! through [`deliver`], so framing and ordering do not depend on the origin.

use crate::channel::Channel;
use crate::mailbox::PushOutcome;
use crate::message::Message;
use tracing::{trace, warn};

/// Outcome of delivering one message to a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Mailboxes that accepted the message.
    pub delivered: usize,
    /// Mailboxes that were already closed.
    pub failed: usize,
    /// Deliveries that evicted an older pending message.
    pub evicted: usize,
}

/// Deliver `message` to every current subscriber of `channel`.
///
/// A closed mailbox is counted in [`Delivery::failed`] and skipped; it never
/// stops delivery to the remaining subscribers.
pub fn deliver(channel: &Channel, message: &Message) -> Delivery {
    let mut delivery = Delivery::default();

    for mailbox in channel.mailboxes() {
        match mailbox.push(message.clone()) {
            Ok(PushOutcome::Queued) => delivery.delivered += 1,
            Ok(PushOutcome::Evicted) => {
                delivery.delivered += 1;
                delivery.evicted += 1;
            }
            Err(_) => delivery.failed += 1,
        }
    }

    if delivery.evicted > 0 {
        warn!(
            channel = channel.id(),
            evicted = delivery.evicted,
            "Mailbox full, dropped oldest message"
        );
    }

    trace!(
        channel = channel.id(),
        origin = %message.origin,
        delivered = delivery.delivered,
        failed = delivery.failed,
        "Delivered message"
    );

    delivery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SubscriberId;
    use crate::mailbox::Mailbox;
    use std::sync::Arc;

    fn channel_with(mailboxes: &[Arc<Mailbox>]) -> Channel {
        let mut channel = Channel::new(1);
        for mailbox in mailboxes {
            channel.add(SubscriberId::generate(), mailbox.clone());
        }
        channel
    }

    #[test]
    fn test_deliver_to_all() {
        let boxes: Vec<_> = (0..3).map(|_| Arc::new(Mailbox::new())).collect();
        let channel = channel_with(&boxes);

        let delivery = deliver(&channel, &Message::push(1, "hi"));
        assert_eq!(delivery.delivered, 3);
        assert_eq!(delivery.failed, 0);
        for mailbox in &boxes {
            assert_eq!(mailbox.try_recv().unwrap().payload(), "hi");
        }
    }

    #[test]
    fn test_closed_mailbox_does_not_abort_batch() {
        let boxes: Vec<_> = (0..3).map(|_| Arc::new(Mailbox::new())).collect();
        boxes[1].close();
        let channel = channel_with(&boxes);

        let delivery = deliver(&channel, &Message::push(1, "hi"));
        assert_eq!(delivery.delivered, 2);
        assert_eq!(delivery.failed, 1);
        assert!(boxes[0].try_recv().is_some());
        assert!(boxes[2].try_recv().is_some());
    }

    #[test]
    fn test_deliver_to_empty_channel() {
        let channel = Channel::new(9);
        assert_eq!(deliver(&channel, &Message::snapshot(9, "[]")), Delivery::default());
    }

    #[test]
    fn test_eviction_is_counted() {
        let mailbox = Arc::new(Mailbox::with_capacity(1));
        let channel = channel_with(std::slice::from_ref(&mailbox));

        deliver(&channel, &Message::push(1, "first"));
        let delivery = deliver(&channel, &Message::push(1, "second"));
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.evicted, 1);
    }
}
