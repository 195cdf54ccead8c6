//! HTTP error responses.
//!
//! Every failure is returned as JSON `{"detail": "..."}` with a matching
//! status code.

use crate::catalog::CatalogError;
use crate::metrics;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use storecast_core::RegistryError;
use storecast_protocol::codec::MAX_FRAME_SIZE;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed store does not exist.
    #[error("Store not found")]
    StoreNotFound,

    /// The addressed table does not exist.
    #[error("Table not found")]
    TableNotFound,

    /// The request carried an invalid value.
    #[error("{0}")]
    BadRequest(String),

    /// The request body could not be read as the expected JSON.
    #[error("{detail}")]
    Rejected {
        /// Status chosen by the extractor.
        status: StatusCode,
        /// Extractor message.
        detail: String,
    },

    /// A pushed message would not fit in one event frame.
    #[error("Message too large: {0} bytes framed, limit {MAX_FRAME_SIZE}")]
    PayloadTooLarge(usize),

    /// The server is shutting down.
    #[error("Server is shutting down")]
    Unavailable,

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::StoreNotFound | ApiError::TableNotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::StoreNotFound => "store_not_found",
            ApiError::TableNotFound => "table_not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Rejected { .. } => "rejected",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Unavailable => "unavailable",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ChannelNotFound(_) => ApiError::StoreNotFound,
            RegistryError::ShuttingDown => ApiError::Unavailable,
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::StoreNotFound(_) => ApiError::StoreNotFound,
            CatalogError::TableNotFound { .. } => ApiError::TableNotFound,
            CatalogError::InvalidStatus(_) => ApiError::BadRequest("Invalid status".into()),
            CatalogError::Encode(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        metrics::record_error(self.kind());
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
