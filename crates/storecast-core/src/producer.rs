//! Per-channel snapshot producer.
//!
//! While a channel has subscribers its producer repeatedly fetches the
//! channel's snapshot, delivers it to every mailbox and sleeps for the
//! configured interval. Each suspension point races the producer's
//! cancellation token, and a snapshot fetched after cancellation is dropped
//! instead of delivered.

use crate::channel::ChannelId;
use crate::dispatch::deliver;
use crate::message::Message;
use crate::registry::ChannelMap;
use crate::source::SnapshotSource;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default delay between two snapshot rounds.
pub const DEFAULT_PRODUCER_INTERVAL: Duration = Duration::from_secs(10);

/// Producer state as reported by diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerState {
    /// No background task is delivering snapshots.
    Stopped,
    /// A background task is delivering snapshots.
    Running,
}

/// Owned handle to a channel's producer task.
#[derive(Debug)]
pub struct ProducerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl ProducerHandle {
    /// Spawn the producer loop for `channel`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        channel: ChannelId,
        channels: Weak<ChannelMap>,
        source: Arc<dyn SnapshotSource>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        let join = tokio::spawn(run(channel, channels, source, interval, token.clone()));
        Self { token, join }
    }

    /// Check whether the loop is still live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.join.is_finished()
    }

    /// Request the loop to stop.
    ///
    /// Safe to call after the loop already exited. The returned handle
    /// completes once the task has terminated.
    pub fn stop(self) -> JoinHandle<()> {
        self.token.cancel();
        self.join
    }
}

async fn run(
    channel: ChannelId,
    channels: Weak<ChannelMap>,
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    token: CancellationToken,
) {
    info!(channel, interval_ms = interval.as_millis() as u64, "Producer started");

    loop {
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = source.snapshot(channel) => result,
        };

        match fetched {
            Ok(payload) => {
                if token.is_cancelled() {
                    break;
                }
                let Some(channels) = channels.upgrade() else {
                    debug!(channel, "Registry dropped, producer exiting");
                    break;
                };
                let message = Message::snapshot(channel, payload);
                if let Some(entry) = channels.get(&channel) {
                    deliver(&entry, &message);
                };
            }
            Err(e) => {
                warn!(channel, error = %e, "Snapshot fetch failed, retrying next interval");
            }
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(channel, "Producer stopped");
}
