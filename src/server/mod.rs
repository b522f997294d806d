//! HTTP surface.
//!
//! Read endpoints serve snapshots of the in-memory log; the write endpoints
//! go through the WhatsApp send path. Everything is JSON except `/qr` and
//! the optional HTML rendering of `/messages`.

mod handlers;
mod pages;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::bridge::Bridge;
use crate::channels::whatsapp::history::HistorySource;
use crate::channels::whatsapp::ConnectionState;
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::webhook::WebhookSink;

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
    pub conn: Arc<ConnectionState>,
    pub webhook: WebhookSink,
    pub history: Option<Arc<dyn HistorySource>>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/qr", get(handlers::qr_page))
        .route("/messages", get(handlers::messages))
        .route("/conversations", get(handlers::conversations))
        .route("/contacts", get(handlers::contacts))
        .route("/history/{phone}", get(handlers::history))
        .route("/send-message", post(handlers::send_message))
        .route("/webhook", post(handlers::webhook_relay))
        .route("/test-webhook", post(handlers::test_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.listen_addr();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP surface listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
