// Application state management
// Connection form values, notifications, conversation and processing status

use crate::worker::WorkerEvent;
use chatsql_backend::config::DatabaseSettings;
use chatsql_backend::db::{ConnectionConfig, DatabaseKind};
use chatsql_backend::session::{ConversationEntry, Notification};

/// Connection form fields, as typed by the user
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionForm {
    /// Driver selection
    pub kind: DatabaseKind,
    pub host: String,
    pub port: String,
    /// Database name (file path for SQLite)
    pub database: String,
    pub user: String,
    /// Shown masked
    pub password: String,
}

impl ConnectionForm {
    /// Empty form with the configured host and port
    pub fn with_defaults(defaults: &DatabaseSettings) -> Self {
        Self {
            kind: DatabaseKind::MySql,
            host: defaults.default_host.clone(),
            port: defaults.default_port.clone(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
        }
    }

    /// Settings to connect with
    pub fn to_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            kind: self.kind,
            host: self.host.trim().to_string(),
            port: self.port.trim().to_string(),
            database: self.database.trim().to_string(),
            user: self.user.trim().to_string(),
            password: self.password.clone(),
        }
    }
}

impl Default for ConnectionForm {
    fn default() -> Self {
        Self::with_defaults(&DatabaseSettings::default())
    }
}

/// Main application state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Connection form
    pub form: ConnectionForm,
    /// Last connect/disconnect outcome
    pub notification: Option<Notification>,
    /// Last failed question, shown under the conversation
    pub last_error: Option<String>,
    /// Answered questions, oldest first
    pub entries: Vec<ConversationEntry>,
    /// Question input
    pub question: String,
    /// Whether a database is connected
    pub connected: bool,
    /// Whether a question is in flight
    pub processing: bool,
    /// Whether a connect or disconnect is in flight
    pub connecting: bool,
}

impl AppState {
    /// Create a new application state with the configured form defaults
    pub fn new(defaults: &DatabaseSettings) -> Self {
        Self {
            form: ConnectionForm::with_defaults(defaults),
            ..Default::default()
        }
    }

    /// Take the typed question for submission
    ///
    /// Returns `None` (and leaves the input alone) while another question is
    /// in flight or when the input is blank.
    pub fn begin_question(&mut self) -> Option<String> {
        if self.processing || self.question.trim().is_empty() {
            return None;
        }
        self.processing = true;
        self.last_error = None;
        Some(std::mem::take(&mut self.question))
    }

    /// Mark a connect or disconnect as started
    ///
    /// Returns `false` if one is already running.
    pub fn begin_connection_change(&mut self) -> bool {
        if self.connecting {
            return false;
        }
        self.connecting = true;
        true
    }

    /// Apply a result from the background worker
    pub fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Connected(Ok(notification)) => {
                self.connecting = false;
                self.connected = true;
                self.notification = Some(notification);
            }
            WorkerEvent::Connected(Err(notification)) => {
                self.connecting = false;
                self.notification = Some(notification);
            }
            WorkerEvent::Disconnected(notification) => {
                self.connecting = false;
                self.connected = false;
                if notification.is_some() {
                    self.notification = notification;
                }
            }
            WorkerEvent::Answered(result) => {
                self.processing = false;
                match result {
                    Ok(Some(entry)) => self.entries.push(entry),
                    Ok(None) => {}
                    Err(message) => self.last_error = Some(message),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsql_backend::session::{Answer, NotificationLevel};

    fn entry(question: &str, text: &str) -> ConversationEntry {
        ConversationEntry::new(question.to_string(), Answer::text(text))
    }

    #[test]
    fn test_form_defaults_and_config() {
        let mut form = ConnectionForm::default();
        assert_eq!(form.host, "localhost");
        assert_eq!(form.port, "3306");

        form.database = " shop ".to_string();
        form.password = " secret ".to_string();
        let config = form.to_config();
        assert_eq!(config.database, "shop");
        assert_eq!(config.password, " secret ");
        assert_eq!(config.kind, DatabaseKind::MySql);
    }

    #[test]
    fn test_begin_question_ignores_while_processing() {
        let mut state = AppState::default();
        assert_eq!(state.begin_question(), None);

        state.question = "How many customers?".to_string();
        assert_eq!(state.begin_question().as_deref(), Some("How many customers?"));
        assert!(state.processing);
        assert!(state.question.is_empty());

        state.question = "Second".to_string();
        assert_eq!(state.begin_question(), None);
        assert_eq!(state.question, "Second");
    }

    #[test]
    fn test_answer_events() {
        let mut state = AppState::default();
        state.question = "q".to_string();
        state.begin_question();

        state.apply(WorkerEvent::Answered(Ok(Some(entry("q", "4")))));
        assert!(!state.processing);
        assert_eq!(state.entries.len(), 1);

        state.question = "again".to_string();
        state.begin_question();
        state.apply(WorkerEvent::Answered(Err("Agent error: boom".to_string())));
        assert!(!state.processing);
        assert_eq!(state.entries.len(), 1);
        assert_eq!(state.last_error.as_deref(), Some("Agent error: boom"));
    }

    #[test]
    fn test_connection_events() {
        let mut state = AppState::default();
        assert!(state.begin_connection_change());
        assert!(!state.begin_connection_change());

        state.apply(WorkerEvent::Connected(Ok(Notification::success(
            Notification::CONNECTED,
        ))));
        assert!(state.connected);
        assert!(!state.connecting);

        state.apply(WorkerEvent::Connected(Err(Notification::error(
            "Error connecting: refused",
        ))));
        assert!(state.connected);
        assert_eq!(
            state.notification.as_ref().map(|n| n.level),
            Some(NotificationLevel::Error)
        );

        state.apply(WorkerEvent::Disconnected(Some(Notification::success(
            Notification::DISCONNECTED,
        ))));
        assert!(!state.connected);
        assert_eq!(
            state.notification.as_ref().map(|n| n.message.as_str()),
            Some("Disconnected successfully!")
        );
    }
}
