//! Shared fixtures for the storecast benchmarks.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use storecast_core::{
    ChannelCatalog, ChannelId, Registry, RegistryConfig, SnapshotSource, SourceError,
};

/// Accepts channel IDs `1..=N`.
pub struct BenchCatalog(pub ChannelId);

impl ChannelCatalog for BenchCatalog {
    fn contains(&self, channel: ChannelId) -> bool {
        (1..=self.0).contains(&channel)
    }
}

/// Returns the same payload for every channel.
pub struct FixedSource(pub String);

#[async_trait]
impl SnapshotSource for FixedSource {
    async fn snapshot(&self, _channel: ChannelId) -> Result<String, SourceError> {
        Ok(self.0.clone())
    }
}

/// A registry over `channels` channels whose producers effectively never tick
/// after their first snapshot.
#[must_use]
pub fn registry(channels: ChannelId, mailbox_capacity: usize) -> Arc<Registry> {
    Registry::new(
        Arc::new(BenchCatalog(channels)),
        Arc::new(FixedSource("[]".to_string())),
        RegistryConfig {
            producer_interval: Duration::from_secs(3600),
            mailbox_capacity,
        },
    )
}
