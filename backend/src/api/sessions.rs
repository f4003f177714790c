//! Session API handlers
//!
//! Connect, disconnect and question handlers for a session, plus the chart
//! image endpoint.

use crate::api::utils::{
    chart_edge, validate_question, DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH,
};
use crate::chart::render_svg;
use crate::db::ConnectionConfig;
use crate::error::AppError;
use crate::session::{ConversationEntry, Notification};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Connection form defaults
#[derive(Debug, Serialize)]
pub struct ConnectionDefaults {
    /// Default host
    pub host: String,
    /// Default port
    pub port: String,
}

/// Response for a newly created session
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    /// ID to use in later requests
    pub session_id: String,
    /// Values to prefill the connection form with
    pub defaults: ConnectionDefaults,
}

/// Session status and conversation
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Session ID
    pub session_id: String,
    /// Whether a database is connected
    pub connected: bool,
    /// Connected database, without the password
    pub connection: Option<String>,
    /// Whether a question is in flight
    pub processing: bool,
    /// Conversation in order
    pub entries: Vec<ConversationEntry>,
}

/// Outcome of connect or disconnect
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    /// Absent when there was nothing to do
    pub notification: Option<Notification>,
}

/// Ask request
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Natural-language question
    pub question: String,
}

/// Ask response
#[derive(Debug, Serialize)]
pub struct AskResponse {
    /// Position of the new entry in the conversation
    pub index: usize,
    /// The recorded question and answer
    pub entry: ConversationEntry,
    /// Where the rendered chart can be fetched, if the answer has one
    pub chart_url: Option<String>,
}

/// Requested chart image size
#[derive(Debug, Default, Deserialize)]
pub struct ChartSize {
    /// Width in pixels
    pub width: Option<u32>,
    /// Height in pixels
    pub height: Option<u32>,
}

/// POST /api/sessions - Start a session
pub async fn create_session(
    State(state): State<SharedState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id().to_string(),
            defaults: ConnectionDefaults {
                host: state.config.database.default_host.clone(),
                port: state.config.database.default_port.clone(),
            },
        }),
    )
}

/// GET /api/sessions/:id - Session status and conversation
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.get(&id).await?;
    Ok(Json(SessionResponse {
        session_id: id,
        connected: session.is_connected().await,
        connection: session.connection_summary().await,
        processing: session.is_processing().await,
        entries: session.entries().await,
    }))
}

/// DELETE /api/sessions/:id - End a session
pub async fn end_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.sessions.end(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/:id/connect - Connect the session to a database
pub async fn connect(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(config): Json<ConnectionConfig>,
) -> Result<Json<NotificationResponse>, AppError> {
    let session = state.sessions.get(&id).await?;
    let notification = session.connect(config).await?;
    Ok(Json(NotificationResponse {
        notification: Some(notification),
    }))
}

/// POST /api/sessions/:id/disconnect - Close the session's connection
pub async fn disconnect(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<NotificationResponse>, AppError> {
    let session = state.sessions.get(&id).await?;
    Ok(Json(NotificationResponse {
        notification: session.disconnect().await,
    }))
}

/// POST /api/sessions/:id/ask - Ask a question
pub async fn ask(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    validate_question(&request.question)?;
    let session = state.sessions.get(&id).await?;

    let (index, entry) = session
        .ask(&request.question)
        .await?
        .ok_or(AppError::QuestionInFlight)?;

    info!(session_id = %id, index = index, "Answer ready");
    let chart_url = entry
        .answer
        .chart
        .as_ref()
        .map(|_| format!("/api/sessions/{}/entries/{}/chart.svg", id, index));

    Ok(Json(AskResponse {
        index,
        entry,
        chart_url,
    }))
}

/// GET /api/sessions/:id/entries/:index/chart.svg - Render an entry's chart
pub async fn chart_svg(
    State(state): State<SharedState>,
    Path((id, index)): Path<(String, usize)>,
    Query(size): Query<ChartSize>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.get(&id).await?;
    let entry = session
        .entry(index)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Entry {} in session {}", index, id)))?;
    let chart = entry
        .answer
        .chart
        .ok_or_else(|| AppError::NotFound(format!("Entry {} has no chart", index)))?;

    let svg = render_svg(
        &chart,
        chart_edge(size.width, DEFAULT_CHART_WIDTH),
        chart_edge(size.height, DEFAULT_CHART_HEIGHT),
    );
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}
