//! Database module
//!
//! Owns the connection to the user's database: the connection manager that
//! holds at most one handle, and the `Database` capability the agent and the
//! chart materializer query through.

pub mod connection;
pub mod database;
pub mod error;

pub use connection::{ConnectionConfig, ConnectionManager, Connector, DatabaseKind, SqlxConnector};
pub use database::{Database, Dialect, QueryResult, SqlxDatabase};
pub use error::{ConnectionError, DatabaseError};
