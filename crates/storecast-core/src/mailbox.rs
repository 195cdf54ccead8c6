//! Per-subscriber message queue.
//!
//! A mailbox is a bounded FIFO with a single consumer. When it is full the
//! oldest pending message is evicted to make room, so an idle or slow client
//! holds at most `capacity` messages and always sees the most recent state.

use crate::message::Message;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;

/// Default number of pending messages a mailbox holds.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Mailbox errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// The mailbox no longer accepts messages.
    #[error("Mailbox closed")]
    Closed,
}

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The message was appended.
    Queued,
    /// The message was appended after evicting the oldest pending one.
    Evicted,
}

#[derive(Debug)]
struct State {
    queue: VecDeque<Message>,
    closed: bool,
}

/// A bounded, drop-oldest message queue.
#[derive(Debug)]
pub struct Mailbox {
    state: Mutex<State>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl Mailbox {
    /// Create a mailbox with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    /// Create a mailbox holding at most `capacity` pending messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state is a plain queue, it stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a message without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Closed`] if the mailbox was closed; the message
    /// is dropped.
    pub fn push(&self, message: Message) -> Result<PushOutcome, MailboxError> {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return Err(MailboxError::Closed);
            }
            let outcome = if state.queue.len() >= self.capacity {
                state.queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Evicted
            } else {
                PushOutcome::Queued
            };
            state.queue.push_back(message);
            outcome
        };
        self.notify.notify_one();
        Ok(outcome)
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the mailbox is closed.
    pub async fn recv(&self) -> Option<Message> {
        loop {
            // Created before the state check so a `close` in between still wakes us.
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(message) = state.queue.pop_front() {
                    return Some(message);
                }
            }
            notified.await;
        }
    }

    /// Take the next message if one is pending.
    pub fn try_recv(&self) -> Option<Message> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.queue.pop_front()
    }

    /// Close the mailbox, discarding pending messages and waking every
    /// pending consumer.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.queue.clear();
        }
        self.notify.notify_waiters();
    }

    /// Check whether the mailbox has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of pending messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Check if no messages are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of pending messages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages evicted by the overflow policy so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
