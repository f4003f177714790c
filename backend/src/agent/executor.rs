//! SQL agent executor
//!
//! Drives the model through a tool-calling loop: the model inspects the
//! schema and runs queries through the SQL tools until it produces a final
//! answer without tool calls.

use crate::agent::tools;
use crate::agent::{AgentError, AgentFactory, AgentOutput, QuestionAgent};
use crate::config::AgentSettings;
use crate::db::Database;
use crate::llm::{ChatMessage, ChatModel, ToolDefinition};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build the system prompt for a database dialect
pub fn system_prompt(dialect: &str, top_k: usize) -> String {
    format!(
        "You are an agent designed to interact with a SQL database.\n\
         Given an input question, create a syntactically correct {dialect} query to run, then look at the results of the query and return the answer.\n\
         Unless the user specifies a specific number of examples they wish to obtain, always limit your query to at most {top_k} results.\n\
         You can order the results by a relevant column to return the most interesting examples in the database.\n\
         Never query for all the columns from a specific table, only ask for the relevant columns given the question.\n\
         You have access to tools for interacting with the database.\n\
         Only use the information returned by the tools to construct your final answer.\n\
         If you get an error while executing a query, rewrite the query and try again.\n\n\
         DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the database.\n\n\
         To start you should ALWAYS look at the tables in the database to see what you can query.\n\
         Do NOT skip this step.\n\
         Then you should query the schema of the most relevant tables."
    )
}

/// Agent that answers questions by querying a database through tools
pub struct SqlAgent {
    model: Arc<dyn ChatModel>,
    db: Arc<dyn Database>,
    tools: Vec<ToolDefinition>,
    max_iterations: usize,
    top_k: usize,
}

impl SqlAgent {
    /// Create an agent bound to `db`
    pub fn new(model: Arc<dyn ChatModel>, db: Arc<dyn Database>, settings: &AgentSettings) -> Self {
        Self {
            model,
            db,
            tools: tools::definitions(),
            max_iterations: settings.max_iterations.max(1),
            top_k: settings.top_k,
        }
    }
}

#[async_trait]
impl QuestionAgent for SqlAgent {
    async fn invoke(&self, prompt: &str) -> Result<AgentOutput, AgentError> {
        let mut messages = vec![
            ChatMessage::system(system_prompt(self.db.dialect().as_str(), self.top_k)),
            ChatMessage::user(prompt),
        ];

        for iteration in 1..=self.max_iterations {
            let completion = self.model.chat(&messages, &self.tools).await?;

            if !completion.has_tool_calls() {
                let output = completion.text().trim().to_string();
                if output.is_empty() {
                    return Err(AgentError::EmptyOutput);
                }
                info!(iteration = iteration, "Agent produced final answer");
                return Ok(AgentOutput { output });
            }

            let calls = completion.message.tool_calls.clone();
            debug!(
                iteration = iteration,
                tool_calls = calls.len(),
                "Agent requested tools"
            );
            messages.push(completion.message);

            for call in &calls {
                let result = tools::dispatch(self.db.as_ref(), call).await;
                messages.push(ChatMessage::tool(call.id.clone(), result));
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Agent hit iteration limit"
        );
        Err(AgentError::IterationLimit(self.max_iterations))
    }
}

/// Builds `SqlAgent`s sharing one chat model
pub struct SqlAgentFactory {
    model: Arc<dyn ChatModel>,
    settings: AgentSettings,
}

impl SqlAgentFactory {
    /// Create a factory
    pub fn new(model: Arc<dyn ChatModel>, settings: AgentSettings) -> Self {
        Self { model, settings }
    }
}

impl AgentFactory for SqlAgentFactory {
    fn build(&self, db: Arc<dyn Database>) -> Arc<dyn QuestionAgent> {
        Arc::new(SqlAgent::new(self.model.clone(), db, &self.settings))
    }
}
