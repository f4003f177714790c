//! Database-specific error types
//!
//! Errors that can occur while opening a connection or running statements
//! against the connected database.

use thiserror::Error;

/// Errors that can occur while opening a database connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection form contains values that cannot be used
    #[error("Invalid connection settings: {0}")]
    InvalidConfig(String),

    /// The driver rejected the connection (unreachable host, bad credentials, ...)
    #[error("{0}")]
    Driver(String),
}

/// Errors that can occur while using an open database handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Statement execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// A table name that does not exist in the connected database
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::Query(err.to_string())
    }
}
