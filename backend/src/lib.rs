//! ChatSQL Backend Library
//!
//! Ask questions about a MySQL database in natural language. This library
//! holds the domain logic shared by the HTTP server (`src/main.rs`) and the
//! native GUI.

pub mod agent;
pub mod api;
pub mod chart;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod response;
pub mod session;
/// Shared server state
pub mod state;
