// State management module
// Shared server state handed to every handler

pub mod app_state;

pub use app_state::{AppState, SharedState};
