//! Session manager
//!
//! Keeps one `SessionContext` per session ID. Sessions are created on demand
//! and live until ended, until they sit idle past the configured limit, or
//! until the server shuts down.

use crate::agent::AgentFactory;
use crate::db::Connector;
use crate::error::AppError;
use crate::session::SessionContext;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Registry of live sessions
pub struct SessionManager {
    /// Map from session ID to its context
    sessions: Arc<RwLock<HashMap<String, Arc<SessionContext>>>>,
    connector: Arc<dyn Connector>,
    factory: Arc<dyn AgentFactory>,
}

impl SessionManager {
    /// Create a manager whose sessions connect through `connector` and
    /// answer with agents from `factory`
    pub fn new(connector: Arc<dyn Connector>, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            connector,
            factory,
        }
    }

    /// Start a new session
    pub async fn create(&self) -> Arc<SessionContext> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(SessionContext::new(
            id.clone(),
            self.connector.clone(),
            self.factory.clone(),
        ));

        self.sessions.write().await.insert(id.clone(), session.clone());
        info!(session_id = %id, "Session created");
        session
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: &str) -> Result<Arc<SessionContext>, AppError> {
        let session = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        session.touch().await;
        Ok(session)
    }

    /// End a session and close its connection
    pub async fn end(&self, id: &str) -> Result<(), AppError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;

        session.close().await;
        info!(session_id = %id, "Session ended");
        Ok(())
    }

    /// End every session, returning how many were closed
    pub async fn end_all(&self) -> usize {
        let sessions: Vec<Arc<SessionContext>> = {
            let mut map = self.sessions.write().await;
            map.drain().map(|(_, s)| s).collect()
        };

        for session in &sessions {
            debug!(session_id = %session.id(), "Closing session");
            session.close().await;
        }

        info!(count = sessions.len(), "All sessions closed");
        sessions.len()
    }

    /// End sessions unused for at least `max_idle`, returning how many were closed
    ///
    /// A session with a question in flight is kept.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let candidates: Vec<Arc<SessionContext>> =
            self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for session in candidates {
            if !session.is_processing().await && session.idle_for().await >= max_idle {
                expired.push(session);
            }
        }
        if expired.is_empty() {
            return 0;
        }

        {
            let mut map = self.sessions.write().await;
            for session in &expired {
                map.remove(session.id());
            }
        }
        for session in &expired {
            session.close().await;
            info!(session_id = %session.id(), "Idle session expired");
        }
        expired.len()
    }

    /// Number of live sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
