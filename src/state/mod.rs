// State management module
// Connection form, conversation and status shown by the GUI

pub mod app_state;

pub use app_state::{AppState, ConnectionForm};
