//! API module
//!
//! HTTP handlers for the session surface and the router that serves them.

pub mod sessions;
pub mod utils;

use crate::state::SharedState;
use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the server answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Human-readable status line
    pub message: String,
}

/// GET /api/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "ChatSQL backend is healthy".to_string(),
    })
}

/// Build the application routes
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::end_session),
        )
        .route("/api/sessions/:id/connect", post(sessions::connect))
        .route("/api/sessions/:id/disconnect", post(sessions::disconnect))
        .route("/api/sessions/:id/ask", post(sessions::ask))
        .route(
            "/api/sessions/:id/entries/:index/chart.svg",
            get(sessions::chart_svg),
        )
        .with_state(state)
}
