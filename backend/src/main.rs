//! ChatSQL Backend
//!
//! HTTP server for asking natural-language questions about a MySQL database.
//! Each session connects to one database and keeps its own conversation.

use axum::{extract::Request, middleware::Next, response::Response};
use chatsql_backend::api;
use chatsql_backend::config::Config;
use chatsql_backend::llm::model_from_config;
use chatsql_backend::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load();
    info!("Configuration loaded: {:?}", config);

    let model = model_from_config(&config.llm);
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;
    let session_idle_secs = config.server.session_idle_secs;
    let state = Arc::new(AppState::from_config(config, model));
    if session_idle_secs > 0 {
        tokio::spawn(expire_idle_sessions(
            state.clone(),
            Duration::from_secs(session_idle_secs),
        ));
    }

    let app = api::router(state.clone())
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive());

    info!("Server running on http://{}", addr);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let closed = state.sessions.end_all().await;
    info!(sessions = closed, "Server shutdown complete");
    Ok(())
}

/// Periodically end sessions that have been idle for `max_idle`
async fn expire_idle_sessions(state: Arc<AppState>, max_idle: Duration) {
    let mut ticker = tokio::time::interval(max_idle.min(Duration::from_secs(60)));
    loop {
        ticker.tick().await;
        let expired = state.sessions.expire_idle(max_idle).await;
        if expired > 0 {
            let remaining = state.sessions.count().await;
            info!(expired = expired, remaining = remaining, "Idle sessions swept");
        }
    }
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
