//! Sessions
//!
//! A session is one user's connection and conversation. `SessionContext`
//! holds that state; `SessionManager` keeps the live sessions.

pub mod context;
pub mod conversation;
pub mod manager;

use crate::db::ConnectionError;
use serde::{Deserialize, Serialize};

pub use context::SessionContext;
pub use conversation::{Answer, ConversationEntry, ConversationState, ProcessingGuard};
pub use manager::SessionManager;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Shown in green
    Success,
    /// Shown in red
    Error,
}

/// User-visible outcome of a connect or disconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Text to show
    pub message: String,
}

impl Notification {
    /// Message after a successful connect
    pub const CONNECTED: &'static str = "Connection successful!";
    /// Message after a disconnect
    pub const DISCONNECTED: &'static str = "Disconnected successfully!";

    /// Success notification
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// Error notification
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    /// Notification for a failed connection attempt
    pub fn connect_failed(err: &ConnectionError) -> Self {
        Self::error(format!("Error connecting: {}", err))
    }
}
