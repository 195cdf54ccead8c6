//! Event stream bodies.
//!
//! Turns a [`Subscription`] into the byte stream of an SSE response. The
//! stream ends when the subscription's mailbox is closed, and dropping the
//! stream drops the subscription, which unsubscribes it.

use crate::metrics::{self, StreamMetricsGuard};
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use storecast_core::Subscription;
use storecast_protocol::{codec, Frame};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

struct StreamState {
    subscription: Subscription,
    keepalive: Interval,
    _metrics: StreamMetricsGuard,
}

/// Build the response body stream for a subscription.
///
/// Each message becomes one `data:` frame. A keep-alive comment is written
/// whenever `keepalive` passes without one.
pub fn event_stream(
    subscription: Subscription,
    keepalive: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        subscription,
        keepalive: ticker,
        _metrics: StreamMetricsGuard::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let (frame, kind) = tokio::select! {
                message = state.subscription.recv() => match message {
                    Some(message) => (Frame::data(message.payload()), "data"),
                    None => {
                        debug!(
                            subscriber = %state.subscription.id(),
                            store = state.subscription.channel(),
                            "Event stream closed"
                        );
                        return None;
                    }
                },
                _ = state.keepalive.tick() => (Frame::keepalive(), "keepalive"),
            };

            match codec::encode(&frame) {
                Ok(bytes) => {
                    if kind == "data" {
                        state.keepalive.reset();
                    }
                    metrics::record_frame(bytes.len(), kind);
                    return Some((Ok(bytes), state));
                }
                Err(e) => {
                    warn!(
                        subscriber = %state.subscription.id(),
                        error = %e,
                        "Dropping message that cannot be framed"
                    );
                }
            }
        }
    })
}
