//! HTTP API for the roomhub node.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use roomhub_auth::JwtVerifier;
use roomhub_realtime::{ConnectionHandler, ErrorKind, RealtimeError};
use roomhub_store::ChatStore;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::realtime_api::realtime_routes;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection handler owning the session registry.
    pub hub: Arc<ConnectionHandler>,
    /// Origins allowed to open a WebSocket. Empty allows any.
    pub allowed_origins: Arc<Vec<String>>,
}

impl AppState {
    /// Wires a store and the configured verifier into a fresh hub.
    pub fn new(config: &Config, store: Arc<dyn ChatStore>) -> Self {
        let verifier = JwtVerifier::with_leeway(config.jwt_secret.as_bytes(), config.jwt_leeway_secs);
        let hub = ConnectionHandler::new(store, Arc::new(verifier))
            .with_max_connections(config.max_connections);
        Self {
            hub: Arc::new(hub),
            allowed_origins: Arc::new(config.allowed_origins.clone()),
        }
    }
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
    #[error("origin not allowed: {0}")]
    OriginRejected(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::OriginRejected(_) => StatusCode::FORBIDDEN,
            ApiError::Realtime(RealtimeError::Authentication(e)) if e.is_forbidden() => {
                StatusCode::FORBIDDEN
            }
            ApiError::Realtime(e) => match e.kind() {
                ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
                ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Transport => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::OriginRejected(_) => "forbidden_origin",
            ApiError::Realtime(RealtimeError::Authentication(e)) if e.is_forbidden() => "forbidden",
            ApiError::Realtime(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // WebSocket and hub stats
        .merge(realtime_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
