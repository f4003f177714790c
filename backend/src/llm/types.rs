//! Chat-completions wire types
//!
//! Structs that mirror the OpenAI chat-completions JSON format.
//! Used for both the request body and the parsed response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    System,
    /// Message from the user
    User,
    /// Message from the model
    Assistant,
    /// Result of a tool call
    Tool,
}

/// A single message in the conversation sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender
    pub role: Role,
    /// Text content (absent on assistant messages that only call tools)
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls requested by the assistant
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
    /// ID of the tool call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

// Some compatible servers send `"tool_calls": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ToolCall>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ToolCall>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Assistant message with text only
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Tool result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back in the tool result
    pub id: String,
    /// Always "function"
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    /// Function name and arguments
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// Function name plus JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function
    pub name: String,
    /// Arguments as a JSON string
    #[serde(default)]
    pub arguments: String,
}

/// A tool the model may call
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function description
    pub function: FunctionDefinition,
}

/// Name, description and JSON-schema parameters of a callable function
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: &'static str,
    /// What the function does
    pub description: &'static str,
    /// JSON schema of the arguments
    pub parameters: Value,
}

impl ToolDefinition {
    /// Function tool definition
    pub fn function(name: &'static str, description: &'static str, parameters: Value) -> Self {
        Self {
            tool_type: "function",
            function: FunctionDefinition {
                name,
                description,
                parameters,
            },
        }
    }
}

/// Request body for the chat-completions endpoint
#[derive(Serialize, Debug)]
pub struct ChatCompletionRequest<'a> {
    /// Model name
    pub model: &'a str,
    /// Conversation so far
    pub messages: &'a [ChatMessage],
    /// Sampling temperature
    pub temperature: f32,
    /// Tools the model may call
    #[serde(skip_serializing_if = "no_tools")]
    pub tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

/// Top-level chat-completions response
#[derive(Deserialize, Debug)]
pub struct ChatCompletionResponse {
    /// Candidate completions
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A single candidate completion
#[derive(Deserialize, Debug)]
pub struct Choice {
    /// The generated message
    pub message: ChatMessage,
    /// Why the model stopped generating
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Parsed outcome of one model call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    /// The assistant message, including any tool calls
    pub message: ChatMessage,
    /// Why the model stopped generating
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// Whether the model asked for tools to be run
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }

    /// Text content, empty if absent
    pub fn text(&self) -> &str {
        self.message.content.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_message_serialization() {
        let msg = ChatMessage::tool("call_1", "[(4,)]");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "[(4,)]", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn test_assistant_tool_call_roundtrip_from_api() {
        let raw = r#"{
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "sql_db_query", "arguments": "{\"query\": \"SELECT 1\"}"}
            }]
        }"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls[0].function.name, "sql_db_query");

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["tool_calls"][0]["type"], "function");
    }

    #[test]
    fn test_null_tool_calls() {
        let raw = r#"{"role": "assistant", "content": "4", "tool_calls": null}"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: 0.0,
            tools: &[],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["messages"][0]["content"], "hi");
    }
}
