//! Agent response post-processing
//!
//! Separates the agent's free text into the prose shown to the user and the
//! optional fenced chart snippet.

pub mod splitter;

pub use splitter::{split, SplitResponse};
