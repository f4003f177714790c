//! Prompt construction and agent invocation
//!
//! Combines the fixed answer-shape instructions, the prior conversation and
//! the new question into the single prompt the agent receives.

use crate::agent::{AgentError, QuestionAgent};
use crate::session::ConversationEntry;
use tracing::{debug, info};

/// Fixed answer for questions the database cannot answer
pub const NOT_AVAILABLE_RESPONSE: &str =
    "Requested information is not available in the database. Please try a different query.";

/// Answer-shape instructions sent with every question
pub const INSTRUCTIONS: &str = r#"
You are an expert data analyst, answer the next user query. The responses depend on the type of information requested in the query.
If the query can be answered textually, provide the answer as a string based on the information in the database and the above chat history (if not blank).

If the user asks for a graph or a visualization in the question, provide a description of the graph/visualization at the very beginning of the response, followed by exactly one chart specification in a fenced ```json block. Do not add introductions before the block or explanations after it. The chart specification has this shape:
{"type": "bar" | "line" | "scatter" | "pie", "title": "...", "x_label": "...", "y_label": "...", "query": "<one read-only SELECT statement returning the plotted columns>", "encoding": {"x": "<column>", "y": "<numeric column>", "color": "<optional column used to split series>"}}
Instead of "query" you may give the rows inline as "data": [{"<column>": <value>, ...}, ...].

If the answer is not known or available, respond with:
"Requested information is not available in the database. Please try a different query."

Return all output as a string.

Now, let's tackle the query step by step. Here's the user query for you to work on:
"#;

/// Serialize prior question/answer pairs (charts excluded)
pub fn format_history(entries: &[ConversationEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("Q: {}\nA: {}", e.question, e.answer.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full prompt for `question` given the conversation so far
pub fn build_prompt(history: &[ConversationEntry], question: &str) -> String {
    format!(
        "Chat history:{}\n {}\n User Query: {}",
        format_history(history),
        INSTRUCTIONS,
        question
    )
}

/// Ask the agent `question` in the context of `history`
///
/// Returns the agent's raw output text. No retry is attempted.
pub async fn ask(
    agent: &dyn QuestionAgent,
    history: &[ConversationEntry],
    question: &str,
) -> Result<String, AgentError> {
    let prompt = build_prompt(history, question);
    debug!(
        history_entries = history.len(),
        prompt_len = prompt.len(),
        "Invoking agent"
    );

    let output = agent.invoke(&prompt).await?.output;
    info!(output_len = output.len(), "Agent answered");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentOutput;
    use crate::session::Answer;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingAgent {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QuestionAgent for RecordingAgent {
        async fn invoke(&self, prompt: &str) -> Result<AgentOutput, AgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(AgentOutput {
                output: "42".to_string(),
            })
        }
    }

    fn entry(question: &str, text: &str) -> ConversationEntry {
        ConversationEntry::new(question.to_string(), Answer::text(text))
    }

    #[test]
    fn test_format_history_pairs() {
        let history = vec![entry("How many?", "4"), entry("And orders?", "3")];
        assert_eq!(format_history(&history), "Q: How many?\nA: 4\nQ: And orders?\nA: 3");
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn test_build_prompt_layout() {
        let prompt = build_prompt(&[entry("How many?", "4")], "Show me a bar chart of sales by month");
        assert!(prompt.starts_with("Chat history:Q: How many?\nA: 4\n "));
        assert!(prompt.contains(NOT_AVAILABLE_RESPONSE));
        assert!(prompt.contains("```json"));
        assert!(prompt.ends_with("\n User Query: Show me a bar chart of sales by month"));
    }

    #[test]
    fn test_build_prompt_empty_history() {
        let prompt = build_prompt(&[], "What is the total number of customers?");
        assert!(prompt.starts_with("Chat history:\n "));
    }

    #[tokio::test]
    async fn test_ask_forwards_prompt() {
        let agent = RecordingAgent {
            prompts: Mutex::new(Vec::new()),
        };
        let output = ask(&agent, &[], "What is the total number of customers?")
            .await
            .unwrap();
        assert_eq!(output, "42");

        let prompts = agent.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with("User Query: What is the total number of customers?"));
    }
}
