//! Chat-completions API client
//!
//! Direct HTTP client for an OpenAI-compatible chat-completions endpoint.
//! This is what the SQL agent calls on every reasoning step.

use crate::config::LlmConfig;
use crate::llm::types::{
    ChatCompletion, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ToolDefinition,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Errors returned by a chat model
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key configured
    #[error("API key is empty; set OPENAI_API_KEY")]
    MissingApiKey,

    /// The request could not be sent or the body could not be read
    #[error("Failed to reach the language model API: {0}")]
    Transport(String),

    /// HTTP 429
    #[error("Language model API rate limit exceeded (HTTP 429): {0}")]
    RateLimited(String),

    /// Any other non-success HTTP status
    #[error("Language model API returned error status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The response body was not the expected JSON
    #[error("Failed to parse JSON response from language model API: {0}")]
    InvalidResponse(String),

    /// The response contained no choices
    #[error("Language model API response contains no choices")]
    NoChoices,
}

/// A chat model that can answer a conversation, optionally calling tools
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the model's next message
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion, LlmError>;
}

/// Client for an OpenAI-compatible chat-completions API
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OpenAiClient {
    /// Create a client from configuration
    ///
    /// # Errors
    /// * `LlmError::MissingApiKey` if no key is configured
    /// * `LlmError::Transport` if the HTTP client cannot be built
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self::with_client(
            client,
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            config.temperature,
        ))
    }

    /// Create a client around an existing `reqwest::Client` (shared connection pool)
    pub fn with_client(
        client: reqwest::Client,
        api_key: String,
        model: String,
        base_url: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature,
        }
    }

    /// Model name requests are sent with
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            tools,
        };

        tracing::debug!(
            url = %url,
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Calling chat-completions API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                status_code = status_code,
                error_body = %error_body,
                "Chat-completions API returned error status"
            );

            if status_code == 429 {
                return Err(LlmError::RateLimited(error_body));
            }
            return Err(LlmError::Status {
                status: status_code,
                body: error_body,
            });
        }

        let response_body = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let parsed: ChatCompletionResponse = serde_json::from_str(&response_body)
            .map_err(|e| LlmError::InvalidResponse(format!("{} - Response body: {}", e, response_body)))?;

        let choice = parsed.choices.into_iter().next().ok_or(LlmError::NoChoices)?;

        tracing::debug!(
            finish_reason = ?choice.finish_reason,
            tool_calls = choice.message.tool_calls.len(),
            "Received chat completion"
        );

        Ok(ChatCompletion {
            message: choice.message,
            finish_reason: choice.finish_reason,
        })
    }
}

/// Chat model for `config`
///
/// Without an API key the returned client fails every call with
/// `LlmError::MissingApiKey`, so the application still starts and can connect
/// to databases.
pub fn model_from_config(config: &LlmConfig) -> Arc<dyn ChatModel> {
    match OpenAiClient::from_config(config) {
        Ok(client) => {
            info!(model = client.model(), "Language model configured");
            Arc::new(client)
        }
        Err(e) => {
            warn!(error = %e, "Language model unavailable, questions will fail until it is configured");
            Arc::new(OpenAiClient::with_client(
                reqwest::Client::new(),
                String::new(),
                config.model.clone(),
                config.base_url.clone(),
                config.temperature,
            ))
        }
    }
}
