//! Producer start/stop decisions and the shutdown sweep.
//!
//! The registry calls into [`Lifecycle`] while it holds a channel's write
//! entry, so a membership change and the producer transition it causes are
//! one step from the point of view of every other caller.

use crate::channel::Channel;
use crate::producer::ProducerHandle;
use crate::registry::ChannelMap;
use crate::source::SnapshotSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) struct Lifecycle {
    root: CancellationToken,
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    shutting_down: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new(source: Arc<dyn SnapshotSource>, interval: Duration) -> Self {
        Self {
            root: CancellationToken::new(),
            source,
            interval,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Make sure a non-empty channel has a live producer.
    pub(crate) fn after_join(&self, channel: &mut Channel, channels: Weak<ChannelMap>) {
        if channel.is_empty() || channel.is_producer_running() {
            return;
        }

        // A handle whose task already exited is replaced.
        if let Some(stale) = channel.producer.take() {
            warn!(channel = channel.id(), "Replacing exited producer");
            drop(stale.stop());
        }

        channel.producer = Some(ProducerHandle::spawn(
            channel.id(),
            channels,
            self.source.clone(),
            self.interval,
            self.root.child_token(),
        ));
        debug!(channel = channel.id(), "Producer Stopped -> Running");
    }

    /// Stop the producer of a channel that just became empty.
    ///
    /// Returns the stopped task's handle, if there was one.
    pub(crate) fn after_leave(&self, channel: &mut Channel) -> Option<JoinHandle<()>> {
        if !channel.is_empty() {
            return None;
        }
        let handle = channel.producer.take()?;
        debug!(channel = channel.id(), "Producer Running -> Stopped");
        Some(handle.stop())
    }

    /// Stop every producer and close every mailbox.
    ///
    /// Never waits on a consumer. New subscriptions are refused from the
    /// moment this is entered.
    pub(crate) fn shutdown(&self, channels: &ChannelMap) -> ShutdownReport {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!("Shutting down channel registry");
        }
        self.root.cancel();

        let mut report = ShutdownReport::default();
        for mut entry in channels.iter_mut() {
            report.channels += 1;
            if let Some(producer) = entry.producer.take() {
                report.handles.push(producer.stop());
                report.producers_stopped += 1;
            }
            for mailbox in entry.drain() {
                mailbox.close();
                report.mailboxes_closed += 1;
            }
        }

        info!(
            channels = report.channels,
            producers = report.producers_stopped,
            subscribers = report.mailboxes_closed,
            "Channel registry shut down"
        );
        report
    }
}

/// Summary of a shutdown sweep.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Channels visited.
    pub channels: usize,
    /// Producers that were stopped.
    pub producers_stopped: usize,
    /// Subscriber mailboxes that were closed.
    pub mailboxes_closed: usize,
    handles: Vec<JoinHandle<()>>,
}

impl ShutdownReport {
    /// Wait for the stopped producer tasks to terminate, for at most `timeout`.
    ///
    /// Returns `true` if every task finished in time. Tasks still running at
    /// the deadline are left detached.
    pub async fn join(self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut all_finished = true;
        for handle in self.handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Producer task ended abnormally"),
                Err(_) => all_finished = false,
            }
        }
        if !all_finished {
            warn!("Producers still running at shutdown deadline");
        }
        all_finished
    }
}
