//! HTTP handlers for the Storecast server.
//!
//! Routes are mounted under `http.base_path`:
//!
//! | Method | Path                                   | Handler                |
//! |--------|----------------------------------------|------------------------|
//! | GET    | `/stores`                              | list stores            |
//! | GET    | `/stores/:store_id/tables`             | current tables         |
//! | POST   | `/stores/:store_id/tables/:table_no/update` | set a table status |
//! | POST   | `/stores/:store_id/push_message`       | push to subscribers    |
//! | GET    | `/events/:store_id`                    | SSE stream             |
//! | GET    | `/check_status`                        | registry diagnostics   |
//!
//! `/health` is always served at the root.

use crate::catalog::{StoreCatalog, StoreId, StoreSummary, TableNo};
use crate::config::Config;
use crate::error::ApiError;
use crate::metrics;
use crate::shutdown;
use crate::stream::event_stream;
use anyhow::Result;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use storecast_core::{ChannelStatus, Message, Registry};
use storecast_protocol::{codec, PushEnvelope, TableSnapshot};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Subscriber and producer registry.
    pub registry: Arc<Registry>,
    /// Stores and their tables.
    pub catalog: Arc<StoreCatalog>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(StoreCatalog::new(&config.catalog));
        let registry = Registry::new(catalog.clone(), catalog.clone(), config.registry_config());

        Self {
            registry,
            catalog,
            config,
        }
    }
}

/// Build the HTTP application.
pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/stores", get(list_stores_handler))
        .route("/stores/:store_id/tables", get(list_tables_handler))
        .route(
            "/stores/:store_id/tables/:table_no/update",
            post(update_status_handler),
        )
        .route("/stores/:store_id/push_message", post(push_message_handler))
        .route("/events/:store_id", get(events_handler))
        .route("/check_status", get(check_status_handler));

    let base_path = state.config.http.base_path.trim_end_matches('/');
    let routes = if base_path.is_empty() {
        api
    } else {
        Router::new().nest(base_path, api)
    };

    routes
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Run the HTTP server until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = app(state.clone());

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Storecast server listening on {}", addr);
    info!(
        "Event streams: http://{}{}/events/{{store_id}}",
        addr, config.http.base_path
    );

    let (report_tx, report_rx) = oneshot::channel();
    let registry = state.registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = shutdown::wait_for_signal().await {
                error!("Failed to listen for shutdown signals: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
            // Ends every open event stream.
            let _ = report_tx.send(registry.shutdown());
        })
        .await?;

    if let Ok(report) = report_rx.await {
        info!(
            channels = report.channels,
            producers = report.producers_stopped,
            mailboxes = report.mailboxes_closed,
            "Registry shut down"
        );
        if !report.join(config.shutdown_grace()).await {
            warn!("Producers did not exit within the shutdown grace period");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List every store.
async fn list_stores_handler(State(state): State<Arc<AppState>>) -> Json<Vec<StoreSummary>> {
    Json(state.catalog.stores())
}

/// Current tables of one store.
async fn list_tables_handler(
    Path(store_id): Path<StoreId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TableSnapshot>>, ApiError> {
    Ok(Json(state.catalog.tables(store_id)?))
}

/// Body of a status update.
#[derive(Debug, Deserialize)]
struct StatusUpdateRequest {
    #[serde(default)]
    status: Value,
}

/// Set the status of one table.
async fn update_status_handler(
    Path((store_id, table_no)): Path<(StoreId, TableNo)>,
    State(state): State<Arc<AppState>>,
    request: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = request?;
    let status = match request.status {
        Value::String(status) => status,
        other => other.to_string(),
    };
    state.catalog.update_status(store_id, table_no, &status)?;
    metrics::record_status_update();

    if state.config.catalog.broadcast_on_update {
        let payload = state.catalog.snapshot_payload(store_id)?;
        let delivery = state
            .registry
            .broadcast_message(&Message::snapshot(store_id, payload))?;
        debug!(
            store = store_id,
            delivered = delivery.delivered,
            "Broadcast snapshot after update"
        );
    }

    Ok(Json(serde_json::json!({ "message": "Status updated" })))
}

/// Body of a pushed message.
#[derive(Debug, Deserialize)]
struct PushRequest {
    #[serde(default)]
    message: Value,
}

/// Response to a pushed message.
#[derive(Debug, Serialize, Deserialize)]
struct PushResponse {
    message: String,
    delivered: usize,
}

/// Deliver a message to every current subscriber of a store.
async fn push_message_handler(
    Path(store_id): Path<StoreId>,
    State(state): State<Arc<AppState>>,
    request: Result<Json<PushRequest>, JsonRejection>,
) -> Result<Json<PushResponse>, ApiError> {
    let Json(request) = request?;
    let payload = PushEnvelope::new(request.message).to_payload()?;
    let framed = codec::data_frame_len(&payload);
    if framed > codec::MAX_FRAME_SIZE {
        return Err(ApiError::PayloadTooLarge(framed));
    }
    let delivered = state.registry.broadcast(store_id, payload)?;
    metrics::record_push(delivered);

    Ok(Json(PushResponse {
        message: format!("Message pushed to {delivered} clients"),
        delivered,
    }))
}

/// Open an SSE stream of a store's snapshots and pushed messages.
async fn events_handler(
    Path(store_id): Path<StoreId>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let subscription = state.registry.subscribe(store_id)?;
    debug!(
        subscriber = %subscription.id(),
        store = store_id,
        "Event stream opened"
    );

    let body = Body::from_stream(event_stream(subscription, state.config.keepalive()));
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}

/// Registry diagnostics.
#[derive(Debug, Serialize, Deserialize)]
struct CheckStatusResponse {
    total_clients: usize,
    store_clients_count: BTreeMap<String, usize>,
    running_producers: Vec<StoreId>,
    channels: BTreeMap<String, ChannelStatusView>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChannelStatusView {
    subscribers: usize,
    producer_running: bool,
}

impl From<&ChannelStatus> for ChannelStatusView {
    fn from(status: &ChannelStatus) -> Self {
        Self {
            subscribers: status.subscribers,
            producer_running: status.producer_running,
        }
    }
}

async fn check_status_handler(State(state): State<Arc<AppState>>) -> Json<CheckStatusResponse> {
    let status = state.registry.status();
    metrics::record_registry(&status);

    Json(CheckStatusResponse {
        total_clients: status.total_subscribers,
        store_clients_count: status
            .channels
            .iter()
            .map(|(id, channel)| (id.to_string(), channel.subscribers))
            .collect(),
        running_producers: status.running_producers.clone(),
        channels: status
            .channels
            .iter()
            .map(|(id, channel)| (id.to_string(), ChannelStatusView::from(channel)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use axum::http::{Request, StatusCode};
    use futures_util::StreamExt;
    use std::time::Duration;
    use storecast_protocol::TableStatus;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        let mut config = Config::default();
        config.catalog = CatalogConfig {
            stores: 3,
            tables_per_store: 5,
            broadcast_on_update: false,
        };
        config.producer.interval_ms = 3_600_000;
        Arc::new(AppState::new(config))
    }

    async fn send(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app(state.clone()).oneshot(request).await.unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let state = state();
        let response = send(&state, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = json_body(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_stores_and_tables() {
        let state = state();

        let response = send(&state, "GET", "/api/stores", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let stores: Vec<Value> = json_body(response).await;
        assert_eq!(stores.len(), 3);
        assert_eq!(stores[2]["name"], "Store 3");

        let response = send(&state, "GET", "/api/stores/2/tables", None).await;
        let tables: Vec<Value> = json_body(response).await;
        assert_eq!(tables.len(), 5);
        assert_eq!(tables[0]["status"], "available");
    }

    #[tokio::test]
    async fn test_unknown_store_is_not_found() {
        let state = state();
        let response = send(&state, "GET", "/api/stores/99/tables", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = json_body(response).await;
        assert_eq!(body["detail"], "Store not found");

        let response = send(&state, "GET", "/api/events/99", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.registry.subscriber_count(99), 0);
    }

    #[tokio::test]
    async fn test_update_status() {
        let state = state();
        let response = send(
            &state,
            "POST",
            "/api/stores/1/tables/4/update",
            Some(serde_json::json!({ "status": "reserved" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let tables: Vec<Value> =
            json_body(send(&state, "GET", "/api/stores/1/tables", None).await).await;
        assert_eq!(tables[3]["status"], "reserved");
    }

    #[tokio::test]
    async fn test_update_rejections_leave_state_unchanged() {
        let state = state();
        let subscription = state.registry.subscribe(1).unwrap();
        // initial snapshot
        subscription.recv().await.unwrap();

        let cases = [
            ("/api/stores/9/tables/1/update", "occupied", StatusCode::NOT_FOUND),
            ("/api/stores/1/tables/9/update", "occupied", StatusCode::NOT_FOUND),
            ("/api/stores/1/tables/1/update", "broken", StatusCode::BAD_REQUEST),
        ];
        for (uri, status, expected) in cases {
            let response = send(
                &state,
                "POST",
                uri,
                Some(serde_json::json!({ "status": status })),
            )
            .await;
            assert_eq!(response.status(), expected, "{uri} {status}");
        }

        let response = send(
            &state,
            "POST",
            "/api/stores/1/tables/1/update",
            Some(serde_json::json!({ "status": 3 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(state
            .catalog
            .tables(1)
            .unwrap()
            .iter()
            .all(|t| t.status == TableStatus::Available));
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_update_broadcasts_when_enabled() {
        let mut config = Config::default();
        config.catalog = CatalogConfig {
            stores: 2,
            tables_per_store: 2,
            broadcast_on_update: true,
        };
        config.producer.interval_ms = 3_600_000;
        let state = Arc::new(AppState::new(config));

        let subscription = state.registry.subscribe(1).unwrap();
        subscription.recv().await.unwrap();

        let response = send(
            &state,
            "POST",
            "/api/stores/1/tables/2/update",
            Some(serde_json::json!({ "status": "occupied" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let message = subscription.try_recv().unwrap();
        assert_eq!(
            message.payload(),
            r#"[{"table_no":1,"status":"available"},{"table_no":2,"status":"occupied"}]"#
        );
    }

    #[tokio::test]
    async fn test_push_message() {
        let state = state();
        let first = state.registry.subscribe(2).unwrap();
        let second = state.registry.subscribe(2).unwrap();
        first.recv().await.unwrap();
        second.recv().await.unwrap();

        let response = send(
            &state,
            "POST",
            "/api/stores/2/push_message",
            Some(serde_json::json!({ "message": "Table 4 is ready" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: PushResponse = json_body(response).await;
        assert_eq!(body.delivered, 2);
        assert_eq!(body.message, "Message pushed to 2 clients");

        for subscription in [&first, &second] {
            assert_eq!(
                subscription.try_recv().unwrap().payload(),
                r#"{"message":"Table 4 is ready"}"#
            );
        }
    }

    #[tokio::test]
    async fn test_push_without_subscribers() {
        let state = state();
        let response = send(
            &state,
            "POST",
            "/api/stores/3/push_message",
            Some(serde_json::json!({ "message": "nobody home" })),
        )
        .await;
        let body: PushResponse = json_body(response).await;
        assert_eq!(body.delivered, 0);

        let response = send(
            &state,
            "POST",
            "/api/stores/42/push_message",
            Some(serde_json::json!({ "message": "x" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_push_too_large_for_a_frame_is_rejected() {
        let state = state();
        let subscription = state.registry.subscribe(1).unwrap();
        subscription.recv().await.unwrap();

        let response = send(
            &state,
            "POST",
            "/api/stores/1/push_message",
            Some(serde_json::json!({ "message": "x".repeat(codec::MAX_FRAME_SIZE) })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().starts_with("Message too large"));
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_has_detail() {
        let state = state();
        let request = Request::builder()
            .method("POST")
            .uri("/api/stores/1/push_message")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"message\":"))
            .unwrap();
        let response = app(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = json_body(response).await;
        assert!(body["detail"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/api/stores/1/tables/1/update")
            .body(Body::from(r#"{"status":"occupied"}"#))
            .unwrap();
        let response = app(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body: Value = json_body(response).await;
        assert!(body["detail"].is_string());
        assert_eq!(state.catalog.tables(1).unwrap()[0].status, TableStatus::Available);
    }

    #[tokio::test]
    async fn test_event_stream() {
        let state = state();
        let response = send(&state, "GET", "/api/events/1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(state.registry.subscriber_count(1), 1);

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"data: [{\"table_no\":1,\"status\":\"available\"}"));

        let status: CheckStatusResponse =
            json_body(send(&state, "GET", "/api/check_status", None).await).await;
        assert_eq!(status.total_clients, 1);
        assert_eq!(status.store_clients_count["1"], 1);
        assert_eq!(status.running_producers, vec![1]);

        drop(body);
        assert_eq!(state.registry.subscriber_count(1), 0);

        // the producer is stopped in the same step as the last unsubscribe
        let status: CheckStatusResponse =
            json_body(send(&state, "GET", "/api/check_status", None).await).await;
        assert_eq!(status.total_clients, 0);
        assert!(status.running_producers.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_is_unavailable() {
        let state = state();
        let report = state.registry.shutdown();
        assert!(report.join(Duration::from_secs(1)).await);

        let response = send(&state, "GET", "/api/events/1", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_custom_base_path() {
        let mut config = Config::default();
        config.http.base_path = "/v2/".into();
        config.catalog.stores = 1;
        let state = Arc::new(AppState::new(config));

        let response = send(&state, "GET", "/v2/stores", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&state, "GET", "/api/stores", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
