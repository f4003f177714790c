//! Question-answering agent
//!
//! `QuestionAgent` is the capability the session talks to: one prompt in,
//! one text blob out. `SqlAgent` implements it with a tool-calling loop over
//! the connected database; `prompt` builds what it is asked.

pub mod executor;
pub mod prompt;
pub mod tools;

use crate::db::Database;
use crate::llm::LlmError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use executor::{SqlAgent, SqlAgentFactory};
pub use prompt::{ask, build_prompt, NOT_AVAILABLE_RESPONSE};

/// Errors raised while answering a question
#[derive(Error, Debug)]
pub enum AgentError {
    /// The language model call failed
    #[error("{0}")]
    Llm(#[from] LlmError),

    /// The model kept calling tools past the iteration limit
    #[error("Agent stopped after {0} iterations without a final answer")]
    IterationLimit(usize),

    /// The model returned an empty final answer
    #[error("Agent returned an empty answer")]
    EmptyOutput,
}

/// Final output of an agent invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    /// The agent's answer text
    pub output: String,
}

/// Answers a prompt, possibly querying the database along the way
#[async_trait]
pub trait QuestionAgent: Send + Sync {
    /// Run the agent to completion on `prompt`
    async fn invoke(&self, prompt: &str) -> Result<AgentOutput, AgentError>;
}

/// Builds an agent for a freshly opened database handle
pub trait AgentFactory: Send + Sync {
    /// Create an agent bound to `db`
    fn build(&self, db: Arc<dyn Database>) -> Arc<dyn QuestionAgent>;
}
