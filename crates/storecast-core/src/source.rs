//! Collaborator interfaces the registry depends on.
//!
//! The registry does not know what a store or a table is. It asks a
//! [`ChannelCatalog`] which channel IDs exist and a [`SnapshotSource`] for
//! the payload its producers redistribute.

use crate::channel::ChannelId;
use async_trait::async_trait;
use thiserror::Error;

/// Snapshot source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The current state of a channel could not be fetched.
    #[error("Snapshot fetch failed for channel {channel}: {reason}")]
    FetchFailed {
        /// Channel whose snapshot was requested.
        channel: ChannelId,
        /// Human-readable cause.
        reason: String,
    },
}

impl SourceError {
    /// Create a fetch failure.
    #[must_use]
    pub fn fetch_failed(channel: ChannelId, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            channel,
            reason: reason.into(),
        }
    }
}

/// The set of channel IDs clients may subscribe and publish to.
pub trait ChannelCatalog: Send + Sync {
    /// Check whether `channel` is a known channel.
    fn contains(&self, channel: ChannelId) -> bool;
}

/// Supplies the current state of a channel for periodic redistribution.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the encoded snapshot for `channel`.
    async fn snapshot(&self, channel: ChannelId) -> Result<String, SourceError>;
}
