// Application state
// Live sessions plus the configuration they were built from

use crate::agent::{AgentFactory, SqlAgentFactory};
use crate::config::Config;
use crate::db::{Connector, SqlxConnector};
use crate::llm::ChatModel;
use crate::session::SessionManager;
use std::sync::Arc;

/// State shared by all handlers
pub type SharedState = Arc<AppState>;

/// Server state
pub struct AppState {
    /// Live sessions
    pub sessions: SessionManager,
    /// Configuration loaded at startup
    pub config: Config,
}

impl AppState {
    /// Create state with explicit collaborators
    pub fn new(config: Config, connector: Arc<dyn Connector>, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            sessions: SessionManager::new(connector, factory),
            config,
        }
    }

    /// Create state that connects with sqlx and answers with SQL agents on `model`
    pub fn from_config(config: Config, model: Arc<dyn ChatModel>) -> Self {
        let connector = Arc::new(SqlxConnector::new(config.database.connect_timeout_secs));
        let factory = Arc::new(SqlAgentFactory::new(model, config.agent.clone()));
        Self::new(config, connector, factory)
    }
}
