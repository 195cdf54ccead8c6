//! Metrics collection and export for Storecast.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use storecast_core::RegistryStatus;
use tracing::info;

/// Metric names.
pub mod names {
    pub const STREAMS_TOTAL: &str = "storecast_streams_total";
    pub const STREAMS_ACTIVE: &str = "storecast_streams_active";
    pub const FRAMES_TOTAL: &str = "storecast_frames_total";
    pub const FRAMES_BYTES: &str = "storecast_frames_bytes";
    pub const PUSHES_TOTAL: &str = "storecast_pushes_total";
    pub const STATUS_UPDATES_TOTAL: &str = "storecast_status_updates_total";
    pub const CHANNELS_ACTIVE: &str = "storecast_channels_active";
    pub const PRODUCERS_RUNNING: &str = "storecast_producers_running";
    pub const ERRORS_TOTAL: &str = "storecast_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::STREAMS_TOTAL,
        "Total number of event streams opened since server start"
    );
    metrics::describe_gauge!(names::STREAMS_ACTIVE, "Current number of open event streams");
    metrics::describe_counter!(names::FRAMES_TOTAL, "Total number of frames written to streams");
    metrics::describe_counter!(names::FRAMES_BYTES, "Total bytes of frames written to streams");
    metrics::describe_counter!(names::PUSHES_TOTAL, "Total number of pushed messages");
    metrics::describe_counter!(
        names::STATUS_UPDATES_TOTAL,
        "Total number of table status updates"
    );
    metrics::describe_gauge!(
        names::CHANNELS_ACTIVE,
        "Current number of stores with at least one subscriber"
    );
    metrics::describe_gauge!(
        names::PRODUCERS_RUNNING,
        "Current number of running snapshot producers"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of request errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record an opened stream.
pub fn record_stream_opened() {
    counter!(names::STREAMS_TOTAL).increment(1);
    gauge!(names::STREAMS_ACTIVE).increment(1.0);
}

/// Record a closed stream.
pub fn record_stream_closed() {
    gauge!(names::STREAMS_ACTIVE).decrement(1.0);
}

/// Record a frame written to a stream.
pub fn record_frame(bytes: usize, kind: &'static str) {
    counter!(names::FRAMES_TOTAL, "kind" => kind).increment(1);
    counter!(names::FRAMES_BYTES, "kind" => kind).increment(bytes as u64);
}

/// Record a pushed message and how many subscribers it reached.
pub fn record_push(delivered: usize) {
    counter!(names::PUSHES_TOTAL, "reached" => if delivered > 0 { "some" } else { "none" })
        .increment(1);
}

/// Record a table status update.
pub fn record_status_update() {
    counter!(names::STATUS_UPDATES_TOTAL).increment(1);
}

/// Publish registry gauges.
pub fn record_registry(status: &RegistryStatus) {
    let active = status.channels.values().filter(|c| c.subscribers > 0).count();
    gauge!(names::CHANNELS_ACTIVE).set(active as f64);
    gauge!(names::PRODUCERS_RUNNING).set(status.running_producers.len() as f64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records stream closure on drop.
pub struct StreamMetricsGuard;

impl StreamMetricsGuard {
    /// Create a new metrics guard, recording an opened stream.
    #[must_use]
    pub fn new() -> Self {
        record_stream_opened();
        Self
    }
}

impl Default for StreamMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamMetricsGuard {
    fn drop(&mut self) {
        record_stream_closed();
    }
}
