//! The channel registry.
//!
//! The registry is the single owner of channel membership. Every subscribe,
//! unsubscribe and shutdown goes through a write entry on the channel map,
//! which serializes membership changes per channel and lets the producer
//! transition happen inside the same critical section.

use crate::channel::{Channel, ChannelId, SubscriberId};
use crate::dispatch::{deliver, Delivery};
use crate::lifecycle::{Lifecycle, ShutdownReport};
use crate::mailbox::{Mailbox, DEFAULT_MAILBOX_CAPACITY};
use crate::message::Message;
use crate::producer::{ProducerState, DEFAULT_PRODUCER_INTERVAL};
use crate::source::{ChannelCatalog, SnapshotSource};
use crate::subscription::Subscription;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub(crate) type ChannelMap = DashMap<ChannelId, Channel>;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The channel is not in the catalog.
    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// The registry was shut down.
    #[error("Registry is shutting down")]
    ShuttingDown,
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Delay between two snapshot rounds of a producer.
    pub producer_interval: Duration,
    /// Pending messages each subscriber mailbox holds.
    pub mailbox_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            producer_interval: DEFAULT_PRODUCER_INTERVAL,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// Diagnostic view of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    /// Current subscriber count.
    pub subscribers: usize,
    /// Whether the channel's producer is running.
    pub producer_running: bool,
}

/// Diagnostic snapshot of the whole registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStatus {
    /// Every channel referenced so far.
    pub channels: BTreeMap<ChannelId, ChannelStatus>,
    /// Channels with a running producer, ascending.
    pub running_producers: Vec<ChannelId>,
    /// Sum of all subscriber counts.
    pub total_subscribers: usize,
}

/// Channel registry.
pub struct Registry {
    channels: Arc<ChannelMap>,
    catalog: Arc<dyn ChannelCatalog>,
    lifecycle: Lifecycle,
    config: RegistryConfig,
}

impl Registry {
    /// Create a registry.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ChannelCatalog>,
        source: Arc<dyn SnapshotSource>,
        config: RegistryConfig,
    ) -> Arc<Self> {
        info!(
            interval_ms = config.producer_interval.as_millis() as u64,
            mailbox_capacity = config.mailbox_capacity,
            "Creating channel registry"
        );
        Arc::new(Self {
            channels: Arc::new(DashMap::new()),
            catalog,
            lifecycle: Lifecycle::new(source, config.producer_interval),
            config,
        })
    }

    fn ensure_known(&self, channel_id: ChannelId) -> Result<(), RegistryError> {
        if self.catalog.contains(channel_id) {
            Ok(())
        } else {
            Err(RegistryError::ChannelNotFound(channel_id))
        }
    }

    /// Subscribe to a channel.
    ///
    /// Starts the channel's producer if this is its first subscriber. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown or the registry is shutting down.
    pub fn subscribe(
        self: &Arc<Self>,
        channel_id: ChannelId,
    ) -> Result<Subscription, RegistryError> {
        self.ensure_known(channel_id)?;
        if self.lifecycle.is_shutting_down() {
            return Err(RegistryError::ShuttingDown);
        }

        let subscriber = SubscriberId::generate();
        let mailbox = Arc::new(Mailbox::with_capacity(self.config.mailbox_capacity));

        {
            let mut entry = self
                .channels
                .entry(channel_id)
                .or_insert_with(|| Channel::new(channel_id));

            // Checked again under the entry so the shutdown sweep cannot miss us.
            if self.lifecycle.is_shutting_down() {
                return Err(RegistryError::ShuttingDown);
            }

            entry.add(subscriber, mailbox.clone());
            self.lifecycle
                .after_join(&mut entry, Arc::downgrade(&self.channels));
        }

        Ok(Subscription::new(subscriber, channel_id, mailbox, self.clone()))
    }

    /// Remove a subscriber from a channel.
    ///
    /// Stops the producer if the channel becomes empty. Removing a subscriber
    /// that is not present does nothing. Returns `true` if it was present.
    pub fn unsubscribe(&self, channel_id: ChannelId, subscriber: SubscriberId) -> bool {
        let Some(mut entry) = self.channels.get_mut(&channel_id) else {
            return false;
        };
        let Some(mailbox) = entry.remove(subscriber) else {
            return false;
        };
        mailbox.close();
        // The stopped task winds down on its own.
        drop(self.lifecycle.after_leave(&mut entry));
        true
    }

    /// Deliver a text payload to every subscriber of a channel.
    ///
    /// Returns the number of subscribers reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown.
    pub fn broadcast(
        &self,
        channel_id: ChannelId,
        payload: impl Into<Arc<str>>,
    ) -> Result<usize, RegistryError> {
        let message = Message::push(channel_id, payload);
        self.broadcast_message(&message).map(|d| d.delivered)
    }

    /// Deliver a prepared message to every subscriber of its channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown.
    pub fn broadcast_message(&self, message: &Message) -> Result<Delivery, RegistryError> {
        self.ensure_known(message.channel)?;
        let delivery = match self.channels.get(&message.channel) {
            Some(entry) => deliver(&entry, message),
            None => Delivery::default(),
        };
        debug!(
            channel = message.channel,
            delivered = delivery.delivered,
            failed = delivery.failed,
            "Broadcast"
        );
        Ok(delivery)
    }

    /// Get a diagnostic snapshot of every channel.
    #[must_use]
    pub fn status(&self) -> RegistryStatus {
        let mut status = RegistryStatus::default();
        for entry in self.channels.iter() {
            let channel = entry.value();
            let channel_status = ChannelStatus {
                subscribers: channel.subscriber_count(),
                producer_running: channel.is_producer_running(),
            };
            status.total_subscribers += channel_status.subscribers;
            if channel_status.producer_running {
                status.running_producers.push(channel.id());
            }
            status.channels.insert(channel.id(), channel_status);
        }
        status.running_producers.sort_unstable();
        status
    }

    /// Get the subscriber count of a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel_id: ChannelId) -> usize {
        self.channels
            .get(&channel_id)
            .map(|e| e.subscriber_count())
            .unwrap_or(0)
    }

    /// Get the producer state of a channel.
    #[must_use]
    pub fn producer_state(&self, channel_id: ChannelId) -> ProducerState {
        match self.channels.get(&channel_id) {
            Some(entry) if entry.is_producer_running() => ProducerState::Running,
            _ => ProducerState::Stopped,
        }
    }

    /// Check whether [`Registry::shutdown`] was called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.lifecycle.is_shutting_down()
    }

    /// Stop every producer and close every subscriber mailbox.
    ///
    /// Pending `recv` calls return `None`. Later subscribe attempts fail with
    /// [`RegistryError::ShuttingDown`].
    pub fn shutdown(&self) -> ShutdownReport {
        self.lifecycle.shutdown(&self.channels)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("channels", &self.channels.len())
            .field("config", &self.config)
            .field("shutting_down", &self.lifecycle.is_shutting_down())
            .finish()
    }
}
