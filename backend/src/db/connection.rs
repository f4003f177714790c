//! Connection manager
//!
//! Holds at most one open database handle. Handles are opened through a
//! `Connector` so tests (and alternative drivers) can stand in for sqlx.

use crate::db::database::{Database, SqlxDatabase};
use crate::db::error::ConnectionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which driver a connection uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// MySQL server reached over TCP
    #[default]
    MySql,
    /// SQLite file; `database` holds the file path
    Sqlite,
}

/// Connection form values
///
/// Kept as typed by the user; the port is parsed when connecting.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Driver to use
    #[serde(default)]
    pub kind: DatabaseKind,
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: String,
    /// Database name (or file path for SQLite)
    pub database: String,
    /// User name
    #[serde(default)]
    pub user: String,
    /// Password
    #[serde(default)]
    pub password: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> String {
    "3306".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::MySql,
            host: default_host(),
            port: default_port(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl ConnectionConfig {
    /// SQLite configuration for a database file
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            kind: DatabaseKind::Sqlite,
            database: path.into(),
            ..Default::default()
        }
    }

    /// Parse the port field
    pub fn port_number(&self) -> Result<u16, ConnectionError> {
        self.port.trim().parse::<u16>().map_err(|_| {
            ConnectionError::InvalidConfig(format!("port must be a number, got '{}'", self.port))
        })
    }

    /// Short description for logs (never includes the password)
    pub fn describe(&self) -> String {
        match self.kind {
            DatabaseKind::MySql => format!(
                "mysql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
            DatabaseKind::Sqlite => format!("sqlite:{}", self.database),
        }
    }
}

/// Opens database handles from connection settings
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a handle, failing with the driver's message
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Database>, ConnectionError>;
}

/// Connector backed by sqlx pools
pub struct SqlxConnector {
    connect_timeout: Duration,
}

impl SqlxConnector {
    /// Create a connector that gives up acquiring a connection after `connect_timeout_secs`
    pub fn new(connect_timeout_secs: u64) -> Self {
        Self {
            connect_timeout: Duration::from_secs(connect_timeout_secs.max(1)),
        }
    }
}

impl Default for SqlxConnector {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Database>, ConnectionError> {
        match config.kind {
            DatabaseKind::MySql => {
                if config.host.trim().is_empty() {
                    return Err(ConnectionError::InvalidConfig(
                        "host cannot be empty".to_string(),
                    ));
                }
                let port = config.port_number()?;
                let mut options = MySqlConnectOptions::new()
                    .host(config.host.trim())
                    .port(port)
                    .username(&config.user)
                    .password(&config.password);
                if !config.database.trim().is_empty() {
                    options = options.database(config.database.trim());
                }

                let pool = MySqlPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(self.connect_timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| ConnectionError::Driver(e.to_string()))?;

                Ok(Arc::new(SqlxDatabase::from_mysql(pool)))
            }
            DatabaseKind::Sqlite => {
                if config.database.trim().is_empty() {
                    return Err(ConnectionError::InvalidConfig(
                        "database file path cannot be empty".to_string(),
                    ));
                }
                let options = SqliteConnectOptions::new()
                    .filename(config.database.trim())
                    .create_if_missing(false);

                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(self.connect_timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| ConnectionError::Driver(e.to_string()))?;

                Ok(Arc::new(SqlxDatabase::from_sqlite(pool)))
            }
        }
    }
}

/// Holds the single active database handle and the settings that produced it
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    config: Option<ConnectionConfig>,
    handle: Option<Arc<dyn Database>>,
}

impl ConnectionManager {
    /// Create a manager with no open handle
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            config: None,
            handle: None,
        }
    }

    /// Open a handle for `config`
    ///
    /// On failure nothing changes: an existing handle stays in place. On
    /// success the previous handle (if any) is closed and replaced.
    pub async fn connect(
        &mut self,
        config: ConnectionConfig,
    ) -> Result<Arc<dyn Database>, ConnectionError> {
        info!(target = %config.describe(), "Connecting to database");

        let handle = self.connector.open(&config).await.map_err(|e| {
            warn!(target = %config.describe(), error = %e, "Database connection failed");
            e
        })?;

        if let Some(previous) = self.handle.take() {
            debug!("Closing previous database handle");
            previous.close().await;
        }

        self.config = Some(config);
        self.handle = Some(handle.clone());
        info!("Database connection established");
        Ok(handle)
    }

    /// Close the active handle and clear the stored settings
    ///
    /// Returns `true` if a handle was open. Safe to call with no handle.
    pub async fn disconnect(&mut self) -> bool {
        self.config = None;
        match self.handle.take() {
            Some(handle) => {
                handle.close().await;
                info!("Database connection closed");
                true
            }
            None => {
                debug!("Disconnect requested with no open connection");
                false
            }
        }
    }

    /// The active handle, if any
    pub fn handle(&self) -> Option<Arc<dyn Database>> {
        self.handle.clone()
    }

    /// Settings of the active connection, if any
    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    /// Whether a handle is open
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_sqlite_file(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        path.to_string_lossy().to_string()
    }

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Arc::new(SqlxConnector::new(2)))
    }

    #[test]
    fn test_defaults_and_debug_mask() {
        let config = ConnectionConfig {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, "3306");
        assert_eq!(config.port_number().unwrap(), 3306);
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert!(!config.describe().contains("hunter2"));
    }

    #[test]
    fn test_invalid_port() {
        let config = ConnectionConfig {
            port: "33o6".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.port_number(),
            Err(ConnectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_deserialize_uses_form_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"database": "shop", "user": "root"}"#).unwrap();
        assert_eq!(config.kind, DatabaseKind::MySql);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, "3306");
        assert_eq!(config.password, "");
    }

    #[tokio::test]
    async fn test_connect_sqlite() {
        let dir = TempDir::new().unwrap();
        let path = create_sqlite_file(&dir, "shop.db").await;
        let mut manager = manager();

        let handle = manager.connect(ConnectionConfig::sqlite(&path)).await.unwrap();
        assert!(manager.is_connected());
        assert_eq!(handle.table_names().await.unwrap(), vec!["t"]);
        assert_eq!(manager.config().map(|c| c.database.clone()), Some(path));
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_existing_handle() {
        let dir = TempDir::new().unwrap();
        let path = create_sqlite_file(&dir, "shop.db").await;
        let mut manager = manager();
        manager.connect(ConnectionConfig::sqlite(&path)).await.unwrap();

        let missing = dir.path().join("missing.db");
        let result = manager
            .connect(ConnectionConfig::sqlite(missing.to_string_lossy()))
            .await;
        assert!(matches!(result, Err(ConnectionError::Driver(_))));
        assert!(manager.is_connected());
        assert_eq!(manager.config().map(|c| c.database.clone()), Some(path));
    }

    #[tokio::test]
    async fn test_connect_unreachable_mysql() {
        let mut manager = manager();
        let config = ConnectionConfig {
            host: "127.0.0.1".to_string(),
            port: "1".to_string(),
            database: "shop".to_string(),
            user: "root".to_string(),
            ..Default::default()
        };
        let result = manager.connect(config).await;
        assert!(matches!(result, Err(ConnectionError::Driver(_))));
        assert!(!manager.is_connected());
        assert!(manager.handle().is_none());
    }

    #[tokio::test]
    async fn test_connect_invalid_port_does_not_dial() {
        let mut manager = manager();
        let config = ConnectionConfig {
            port: "abc".to_string(),
            ..Default::default()
        };
        let result = manager.connect(config).await;
        assert!(matches!(result, Err(ConnectionError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_reconnect_replaces_handle() {
        let dir = TempDir::new().unwrap();
        let first = create_sqlite_file(&dir, "a.db").await;
        let second = create_sqlite_file(&dir, "b.db").await;
        let mut manager = manager();

        let old = manager.connect(ConnectionConfig::sqlite(&first)).await.unwrap();
        manager.connect(ConnectionConfig::sqlite(&second)).await.unwrap();

        assert!(old.run("SELECT 1").await.is_err());
        assert_eq!(manager.config().map(|c| c.database.clone()), Some(second));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = create_sqlite_file(&dir, "shop.db").await;
        let mut manager = manager();

        assert!(!manager.disconnect().await);

        let handle = manager.connect(ConnectionConfig::sqlite(&path)).await.unwrap();
        assert!(manager.disconnect().await);
        assert!(!manager.is_connected());
        assert!(manager.config().is_none());
        assert!(handle.run("SELECT 1").await.is_err());

        assert!(!manager.disconnect().await);
    }
}
