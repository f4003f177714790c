// Background worker
// Runs session operations on a tokio runtime so the UI thread never blocks

use chatsql_backend::agent::SqlAgentFactory;
use chatsql_backend::config::Config;
use chatsql_backend::db::{ConnectionConfig, SqlxConnector};
use chatsql_backend::llm::model_from_config;
use chatsql_backend::session::{ConversationEntry, Notification, SessionContext};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Result of a background operation
#[derive(Debug)]
pub enum WorkerEvent {
    /// Connect finished; the error side carries the failure notification
    Connected(Result<Notification, Notification>),
    /// Disconnect finished; `None` when nothing was connected
    Disconnected(Option<Notification>),
    /// Question finished; `Ok(None)` when it was ignored
    Answered(Result<Option<ConversationEntry>, String>),
}

/// Owns the runtime and the desktop session
pub struct Worker {
    runtime: Runtime,
    session: Arc<SessionContext>,
    tx: UnboundedSender<WorkerEvent>,
    rx: UnboundedReceiver<WorkerEvent>,
}

impl Worker {
    /// Worker with a session built from `config`
    pub fn new(config: &Config) -> std::io::Result<Self> {
        let model = model_from_config(&config.llm);
        let session = SessionContext::new(
            "desktop",
            Arc::new(SqlxConnector::new(config.database.connect_timeout_secs)),
            Arc::new(SqlAgentFactory::new(model, config.agent.clone())),
        );
        Self::with_session(Arc::new(session))
    }

    /// Worker driving an existing session
    pub fn with_session(session: Arc<SessionContext>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (tx, rx) = unbounded_channel();
        Ok(Self {
            runtime,
            session,
            tx,
            rx,
        })
    }

    fn spawn<F, N>(&self, work: F, notify: N)
    where
        F: std::future::Future<Output = WorkerEvent> + Send + 'static,
        N: Fn() + Send + 'static,
    {
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let event = work.await;
            if tx.send(event).is_err() {
                debug!("Worker event dropped, receiver gone");
            }
            notify();
        });
    }

    /// Connect the session in the background
    pub fn connect<N: Fn() + Send + 'static>(&self, config: ConnectionConfig, notify: N) {
        let session = self.session.clone();
        self.spawn(
            async move {
                WorkerEvent::Connected(
                    session
                        .connect(config)
                        .await
                        .map_err(|e| Notification::connect_failed(&e)),
                )
            },
            notify,
        );
    }

    /// Disconnect the session in the background
    pub fn disconnect<N: Fn() + Send + 'static>(&self, notify: N) {
        let session = self.session.clone();
        self.spawn(
            async move { WorkerEvent::Disconnected(session.disconnect().await) },
            notify,
        );
    }

    /// Ask a question in the background
    pub fn ask<N: Fn() + Send + 'static>(&self, question: String, notify: N) {
        let session = self.session.clone();
        self.spawn(
            async move {
                let result = session
                    .ask(&question)
                    .await
                    .map(|answered| answered.map(|(_, entry)| entry))
                    .map_err(|e| {
                        warn!(error = %e, "Question failed");
                        e.to_string()
                    });
                WorkerEvent::Answered(result)
            },
            notify,
        );
    }

    /// Results that arrived since the last poll
    pub fn poll(&mut self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Close the session's connection
    pub fn shutdown(&self) {
        self.runtime.block_on(self.session.close());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsql_backend::session::NotificationLevel;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn wait_for_event(worker: &mut Worker) -> WorkerEvent {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(event) = worker.poll().into_iter().next() {
                return event;
            }
            assert!(Instant::now() < deadline, "no worker event");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_failed_connect_reports_notification() {
        let dir = TempDir::new().unwrap();
        let mut worker = Worker::new(&Config::default()).unwrap();
        let missing = dir.path().join("missing.db").to_string_lossy().to_string();

        worker.connect(ConnectionConfig::sqlite(missing), || {});
        match wait_for_event(&mut worker) {
            WorkerEvent::Connected(Err(notification)) => {
                assert_eq!(notification.level, NotificationLevel::Error);
                assert!(notification.message.starts_with("Error connecting: "));
            }
            other => panic!("Expected failed connect, got: {:?}", other),
        }
    }

    #[test]
    fn test_question_without_connection() {
        let mut worker = Worker::new(&Config::default()).unwrap();
        worker.ask("How many customers?".to_string(), || {});
        match wait_for_event(&mut worker) {
            WorkerEvent::Answered(Err(message)) => {
                assert_eq!(message, "Not connected to a database")
            }
            other => panic!("Expected not connected error, got: {:?}", other),
        }
    }

    #[test]
    fn test_disconnect_without_connection() {
        let mut worker = Worker::new(&Config::default()).unwrap();
        worker.disconnect(|| {});
        assert!(matches!(
            wait_for_event(&mut worker),
            WorkerEvent::Disconnected(None)
        ));
        worker.shutdown();
    }
}
