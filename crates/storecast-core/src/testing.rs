//! Test doubles for the collaborator traits.

use crate::channel::ChannelId;
use crate::source::{ChannelCatalog, SnapshotSource, SourceError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Catalog accepting the IDs `1..=max`.
pub(crate) struct RangeCatalog(pub ChannelId);

impl ChannelCatalog for RangeCatalog {
    fn contains(&self, channel: ChannelId) -> bool {
        (1..=self.0).contains(&channel)
    }
}

/// Source answering `snapshot-<channel>-<call>`, with optional failures and latency.
pub(crate) struct ScriptedSource {
    calls: AtomicU64,
    failures: AtomicUsize,
    delay: Mutex<Duration>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            failures: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Make the next `n` calls fail.
    pub(crate) fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn snapshot(&self, channel: ChannelId) -> Result<String, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SourceError::fetch_failed(channel, "scripted failure"));
        }
        Ok(format!("snapshot-{channel}-{call}"))
    }
}
