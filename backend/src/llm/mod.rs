//! Language model module
//!
//! OpenAI-compatible chat-completions client with tool-call support, behind
//! the `ChatModel` trait the SQL agent is written against.

pub mod client;
pub mod types;

pub use client::{model_from_config, ChatModel, LlmError, OpenAiClient};
pub use types::{
    ChatCompletion, ChatMessage, FunctionCall, FunctionDefinition, Role, ToolCall, ToolDefinition,
};
