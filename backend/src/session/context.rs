//! Session context
//!
//! Everything one user session owns: the database connection, the agent bound
//! to it, the conversation and the processing flag. The HTTP handlers and the
//! GUI both drive a session through this type.

use crate::agent::{self, AgentFactory, QuestionAgent};
use crate::chart;
use crate::db::{ConnectionConfig, ConnectionError, ConnectionManager, Connector, Database};
use crate::error::AppError;
use crate::response;
use crate::session::conversation::{Answer, ConversationEntry, ConversationState};
use crate::session::Notification;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Connection plus the agent built for it
struct Link {
    manager: ConnectionManager,
    agent: Option<Arc<dyn QuestionAgent>>,
}

/// State of one session
pub struct SessionContext {
    id: String,
    link: Mutex<Link>,
    conversation: RwLock<ConversationState>,
    factory: Arc<dyn AgentFactory>,
    last_active: Mutex<Instant>,
}

impl SessionContext {
    /// Unconnected session with an empty conversation
    pub fn new(
        id: impl Into<String>,
        connector: Arc<dyn Connector>,
        factory: Arc<dyn AgentFactory>,
    ) -> Self {
        Self {
            id: id.into(),
            link: Mutex::new(Link {
                manager: ConnectionManager::new(connector),
                agent: None,
            }),
            conversation: RwLock::new(ConversationState::new()),
            factory,
            last_active: Mutex::new(Instant::now()),
        }
    }

    /// Session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record activity on the session
    pub async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    /// Time since the session was last used
    pub async fn idle_for(&self) -> Duration {
        self.last_active.lock().await.elapsed()
    }

    /// Connect to the database described by `config`
    ///
    /// A failed attempt leaves any existing connection (and its agent) in place.
    pub async fn connect(&self, config: ConnectionConfig) -> Result<Notification, ConnectionError> {
        let mut link = self.link.lock().await;
        let handle = link.manager.connect(config).await?;
        link.agent = Some(self.factory.build(handle));
        info!(session_id = %self.id, "Session connected");
        Ok(Notification::success(Notification::CONNECTED))
    }

    /// Close the connection, if any
    ///
    /// Returns the notification to show, or `None` when nothing was connected.
    pub async fn disconnect(&self) -> Option<Notification> {
        let mut link = self.link.lock().await;
        link.agent = None;
        if link.manager.disconnect().await {
            info!(session_id = %self.id, "Session disconnected");
            Some(Notification::success(Notification::DISCONNECTED))
        } else {
            None
        }
    }

    /// Whether a database is connected
    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.manager.is_connected()
    }

    /// Redacted description of the current connection
    pub async fn connection_summary(&self) -> Option<String> {
        self.link.lock().await.manager.config().map(|c| c.describe())
    }

    /// Whether a question is in flight
    pub async fn is_processing(&self) -> bool {
        self.conversation.read().await.is_processing()
    }

    /// Snapshot of the conversation
    pub async fn entries(&self) -> Vec<ConversationEntry> {
        self.conversation.read().await.all().to_vec()
    }

    /// Entry at `index`
    pub async fn entry(&self, index: usize) -> Option<ConversationEntry> {
        self.conversation.read().await.get(index).cloned()
    }

    /// Answer `question` and append the result to the conversation
    ///
    /// Returns the new entry with its position in the conversation, or
    /// `Ok(None)` when another question is still in flight; the
    /// question is then ignored. Agent failures are returned and nothing is
    /// appended. A chart that cannot be produced does not fail the question:
    /// the entry keeps its prose and records the chart error.
    pub async fn ask(
        &self,
        question: &str,
    ) -> Result<Option<(usize, ConversationEntry)>, AppError> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "Question cannot be empty".to_string(),
            ));
        }

        let (agent, db) = {
            let link = self.link.lock().await;
            match (&link.agent, link.manager.handle()) {
                (Some(agent), Some(db)) => (agent.clone(), db),
                _ => return Err(AppError::NotConnected),
            }
        };

        let guard = self.conversation.read().await.try_begin();
        let Some(_guard) = guard else {
            debug!(session_id = %self.id, "Question ignored, another is in flight");
            return Ok(None);
        };

        info!(
            session_id = %self.id,
            question_len = question.len(),
            "Processing question"
        );

        let history = self.entries().await;
        let raw = agent::ask(agent.as_ref(), &history, question)
            .await
            .map_err(|e| {
                warn!(session_id = %self.id, error = %e, "Agent failed");
                e
            })?;

        let answer = self.build_answer(&raw, db.as_ref()).await;
        let (index, entry) = self
            .conversation
            .write()
            .await
            .append(question.to_string(), answer);

        info!(
            session_id = %self.id,
            index = index,
            has_chart = entry.answer.chart.is_some(),
            "Question answered"
        );
        Ok(Some((index, entry)))
    }

    async fn build_answer(&self, raw: &str, db: &dyn Database) -> Answer {
        let split = response::split(raw);
        let Some(snippet) = split.snippet else {
            return Answer::text(split.prose);
        };

        match chart::materialize(&snippet, Some(db)).await {
            Ok(chart) => Answer {
                chart,
                text: split.prose,
                chart_error: None,
            },
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Chart could not be produced");
                Answer {
                    chart: None,
                    text: split.prose,
                    chart_error: Some(e.to_string()),
                }
            }
        }
    }

    /// Release the session's resources
    pub async fn close(&self) {
        let mut link = self.link.lock().await;
        link.agent = None;
        link.manager.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentError, AgentOutput};
    use crate::chart::ChartKind;
    use crate::db::SqlxDatabase;
    use crate::session::NotificationLevel;
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// Opens an in-memory database; the database name "missing" fails
    struct MemoryConnector;

    #[async_trait]
    impl Connector for MemoryConnector {
        async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Database>, ConnectionError> {
            if config.database == "missing" {
                return Err(ConnectionError::Driver(
                    "Unknown database 'missing'".to_string(),
                ));
            }
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(|e| ConnectionError::Driver(e.to_string()))?;
            sqlx::query("CREATE TABLE sales (month TEXT, total REAL)")
                .execute(&pool)
                .await
                .map_err(|e| ConnectionError::Driver(e.to_string()))?;
            sqlx::query("INSERT INTO sales VALUES ('Jan', 10), ('Feb', 12)")
                .execute(&pool)
                .await
                .map_err(|e| ConnectionError::Driver(e.to_string()))?;
            Ok(Arc::new(SqlxDatabase::from_sqlite(pool)))
        }
    }

    /// Replies in order; `None` makes the agent fail
    struct ScriptedAgent {
        replies: StdMutex<VecDeque<Option<String>>>,
        prompts: StdMutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl QuestionAgent for ScriptedAgent {
        async fn invoke(&self, prompt: &str) -> Result<AgentOutput, AgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let reply = self.replies.lock().unwrap().pop_front().flatten();
            reply
                .map(|output| AgentOutput { output })
                .ok_or(AgentError::EmptyOutput)
        }
    }

    struct ScriptedFactory {
        agent: Arc<ScriptedAgent>,
    }

    impl AgentFactory for ScriptedFactory {
        fn build(&self, _db: Arc<dyn Database>) -> Arc<dyn QuestionAgent> {
            self.agent.clone()
        }
    }

    fn session(replies: Vec<Option<&str>>, gate: Option<Arc<Notify>>) -> (SessionContext, Arc<ScriptedAgent>) {
        let agent = Arc::new(ScriptedAgent {
            replies: StdMutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
            prompts: StdMutex::new(Vec::new()),
            gate,
        });
        let factory = Arc::new(ScriptedFactory {
            agent: agent.clone(),
        });
        (
            SessionContext::new("test-session", Arc::new(MemoryConnector), factory),
            agent,
        )
    }

    fn config(database: &str) -> ConnectionConfig {
        ConnectionConfig {
            database: database.to_string(),
            user: "root".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_notifications() {
        let (ctx, _) = session(vec![], None);
        assert!(ctx.disconnect().await.is_none());

        let note = ctx.connect(config("shop")).await.unwrap();
        assert_eq!(note.level, NotificationLevel::Success);
        assert_eq!(note.message, "Connection successful!");
        assert!(ctx.is_connected().await);
        assert_eq!(ctx.connection_summary().await.as_deref(), Some("mysql://root@localhost:3306/shop"));

        let note = ctx.disconnect().await.unwrap();
        assert_eq!(note.message, "Disconnected successfully!");
        assert!(!ctx.is_connected().await);
        assert!(ctx.disconnect().await.is_none());
        assert_eq!(ctx.connection_summary().await, None);
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_existing_connection() {
        let (ctx, _) = session(vec![], None);
        ctx.connect(config("shop")).await.unwrap();

        let err = ctx.connect(config("missing")).await.unwrap_err();
        assert_eq!(
            Notification::connect_failed(&err).message,
            "Error connecting: Unknown database 'missing'"
        );
        assert!(ctx.is_connected().await);
        assert_eq!(ctx.connection_summary().await.as_deref(), Some("mysql://root@localhost:3306/shop"));
    }

    #[tokio::test]
    async fn test_ask_requires_question_and_connection() {
        let (ctx, _) = session(vec![Some("4")], None);
        assert!(matches!(ctx.ask("   ").await, Err(AppError::InvalidRequest(_))));
        assert!(matches!(
            ctx.ask("How many customers?").await,
            Err(AppError::NotConnected)
        ));
        assert!(ctx.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_text_answer_and_history() {
        let (ctx, agent) = session(vec![Some("There are 4 customers."), Some("3")], None);
        ctx.connect(config("shop")).await.unwrap();

        let (index, entry) = ctx.ask("How many customers?").await.unwrap().unwrap();
        assert_eq!(index, 0);
        assert_eq!(entry.answer, Answer::text("There are 4 customers."));

        let (index, _) = ctx.ask("And orders?").await.unwrap().unwrap();
        assert_eq!(index, 1);
        let entries = ctx.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].question, "And orders?");

        let prompts = agent.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("Chat history:\n "));
        assert!(prompts[1].starts_with("Chat history:Q: How many customers?\nA: There are 4 customers.\n "));
    }

    #[tokio::test]
    async fn test_chart_answer() {
        let reply = "Monthly sales as a bar chart.\n```json\n{\"type\": \"bar\", \"query\": \"SELECT month, total FROM sales\", \"encoding\": {\"x\": \"month\", \"y\": \"total\"}}\n```";
        let (ctx, _) = session(vec![Some(reply)], None);
        ctx.connect(config("shop")).await.unwrap();

        let (_, entry) = ctx.ask("Show me a bar chart of sales by month").await.unwrap().unwrap();
        assert_eq!(entry.answer.text, "Monthly sales as a bar chart.");
        let chart = entry.answer.chart.unwrap();
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.categories(), vec!["Jan", "Feb"]);
        assert_eq!(entry.answer.chart_error, None);
    }

    #[tokio::test]
    async fn test_bad_chart_keeps_prose() {
        let reply = "Here you go.\n```json\n{\"type\": \"bar\", \"query\": \"DELETE FROM sales\", \"encoding\": {\"x\": \"month\", \"y\": \"total\"}}\n```";
        let (ctx, _) = session(vec![Some(reply)], None);
        ctx.connect(config("shop")).await.unwrap();

        let (_, entry) = ctx.ask("Chart it").await.unwrap().unwrap();
        assert_eq!(entry.answer.text, "Here you go.");
        assert!(entry.answer.chart.is_none());
        assert_eq!(
            entry.answer.chart_error.as_deref(),
            Some("Chart query must be a single SELECT statement")
        );
        assert_eq!(ctx.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_agent_failure_releases_guard() {
        let (ctx, _) = session(vec![None, Some("4")], None);
        ctx.connect(config("shop")).await.unwrap();

        assert!(matches!(ctx.ask("first").await, Err(AppError::Agent(_))));
        assert!(!ctx.is_processing().await);
        assert!(ctx.entries().await.is_empty());

        let (index, entry) = ctx.ask("second").await.unwrap().unwrap();
        assert_eq!(index, 0);
        assert_eq!(entry.answer.text, "4");
    }

    #[tokio::test]
    async fn test_second_question_ignored_while_processing() {
        let gate = Arc::new(Notify::new());
        let (ctx, _) = session(vec![Some("slow answer"), Some("unused")], Some(gate.clone()));
        let ctx = Arc::new(ctx);
        ctx.connect(config("shop")).await.unwrap();

        let first = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.ask("first").await })
        };

        while !ctx.is_processing().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(ctx.ask("second").await.unwrap(), None);

        gate.notify_one();
        let (index, entry) = first.await.unwrap().unwrap().unwrap();
        assert_eq!(index, 0);
        assert_eq!(entry.answer.text, "slow answer");
        assert_eq!(ctx.entries().await.len(), 1);
        assert!(!ctx.is_processing().await);
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let (ctx, _) = session(vec![], None);
        ctx.connect(config("shop")).await.unwrap();
        ctx.close().await;
        assert!(!ctx.is_connected().await);
    }
}
