//! Router configuration for the Yak HTTP API.

use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{events, list_commands, login, post_message, AppState};
use super::middleware::create_cors_layer;

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/messages", post(post_message))
        .route("/events", get(events))
        .route("/slash-commands", get(list_commands))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Create a router serving the client bundle.
///
/// Returns `None` if the directory does not exist.
pub fn create_static_router(static_path: &str) -> Option<Router> {
    if !Path::new(static_path).is_dir() {
        tracing::warn!(path = %static_path, "Static directory not found, not serving client");
        return None;
    }
    tracing::info!(path = %static_path, "Serving client files");
    Some(Router::new().fallback_service(ServeDir::new(static_path)))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
