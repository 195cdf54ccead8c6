//! # Storecast Server
//!
//! Broadcasts the table status of every store to Server-Sent Events clients.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! storecast
//!
//! # Run with a config file
//! STORECAST_CONFIG=/path/to/storecast.toml storecast
//!
//! # Run with environment variables
//! STORECAST_PORT=8080 STORECAST_HOST=0.0.0.0 STORECAST_PRODUCER__INTERVAL_MS=5000 storecast
//! ```

mod catalog;
mod config;
mod error;
mod handlers;
mod metrics;
mod shutdown;
mod stream;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storecast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(
        "Starting Storecast server on {}:{} ({} stores)",
        config.host,
        config.port,
        config.catalog.stores
    );

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
