//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// All errors that can occur in the application are represented by this enum.
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Session with the given ID was not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Opening the database connection failed
    #[error("Error connecting: {0}")]
    Connection(#[from] crate::db::ConnectionError),

    /// A question was asked before a database was connected
    #[error("Not connected to a database")]
    NotConnected,

    /// Another question is still being processed in this session
    #[error("A question is already being processed")]
    QuestionInFlight,

    /// The question-answering agent failed
    #[error("Agent error: {0}")]
    Agent(#[from] crate::agent::AgentError),

    /// Request payload is invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Connection(_) => StatusCode::BAD_GATEWAY,
            AppError::NotConnected => StatusCode::CONFLICT,
            AppError::QuestionInFlight => StatusCode::CONFLICT,
            AppError::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %error_message, "Request failed");
        }

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
