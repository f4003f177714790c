//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Language model configuration
    pub llm: LlmConfig,
    /// SQL agent configuration
    pub agent: AgentSettings,
    /// Database connection defaults and limits
    pub database: DatabaseSettings,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
    /// Idle time after which a session is ended (in seconds, 0 keeps sessions forever)
    pub session_idle_secs: u64,
}

/// Language model configuration
#[derive(Clone)]
pub struct LlmConfig {
    /// API key for the chat-completions endpoint
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Request timeout (in seconds)
    pub timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f32,
}

// Keeps the API key out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// SQL agent configuration
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Maximum model round-trips per question
    pub max_iterations: usize,
    /// Row limit the agent is told to apply to its queries
    pub top_k: usize,
}

/// Database connection defaults and limits
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Default host shown in the connection form
    pub default_host: String,
    /// Default port shown in the connection form
    pub default_port: String,
    /// Timeout for acquiring the first connection (in seconds)
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            session_idle_secs: 3600,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-2024-05-13".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 120,
            temperature: 0.0,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            top_k: 10,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            default_host: "localhost".to_string(),
            default_port: "3306".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load `.env` (if present) and then the environment
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded .env from {}", path.display()),
            Err(e) => tracing::debug!("No .env loaded: {}", e),
        }
        Self::from_env()
    }

    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let server_defaults = ServerConfig::default();
        let llm_defaults = LlmConfig::default();
        let agent_defaults = AgentSettings::default();
        let db_defaults = DatabaseSettings::default();

        Self {
            server: ServerConfig {
                port: parse_env("PORT", server_defaults.port),
                host: env::var("HOST").unwrap_or(server_defaults.host),
                session_idle_secs: parse_env("SESSION_IDLE_SECS", server_defaults.session_idle_secs),
            },
            llm: LlmConfig {
                api_key: env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
                model: env::var("OPENAI_MODEL").unwrap_or(llm_defaults.model),
                base_url: env::var("OPENAI_BASE_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or(llm_defaults.base_url),
                timeout_secs: parse_env("LLM_TIMEOUT_SECS", llm_defaults.timeout_secs),
                temperature: parse_env("LLM_TEMPERATURE", llm_defaults.temperature),
            },
            agent: AgentSettings {
                max_iterations: parse_env("AGENT_MAX_ITERATIONS", agent_defaults.max_iterations)
                    .max(1),
                top_k: parse_env("AGENT_TOP_K", agent_defaults.top_k).max(1),
            },
            database: DatabaseSettings {
                default_host: env::var("DB_DEFAULT_HOST").unwrap_or(db_defaults.default_host),
                default_port: env::var("DB_DEFAULT_PORT").unwrap_or(db_defaults.default_port),
                connect_timeout_secs: parse_env(
                    "DB_CONNECT_TIMEOUT_SECS",
                    db_defaults.connect_timeout_secs,
                ),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "PORT",
        "HOST",
        "SESSION_IDLE_SECS",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_BASE_URL",
        "AGENT_MAX_ITERATIONS",
        "DB_DEFAULT_PORT",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.server.session_idle_secs, 3600);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.model, "gpt-4o-2024-05-13");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.database.default_host, "localhost");
        assert_eq!(config.database.default_port, "3306");
    }

    #[test]
    #[serial]
    fn test_overrides_and_invalid_values() {
        clear_env();
        env::set_var("PORT", "not-a-port");
        env::set_var("OPENAI_API_KEY", "sk-test");
        env::set_var("OPENAI_BASE_URL", "http://localhost:9999/v1/");
        env::set_var("AGENT_MAX_ITERATIONS", "0");
        env::set_var("DB_DEFAULT_PORT", "3307");
        env::set_var("SESSION_IDLE_SECS", "0");

        let config = Config::from_env();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.base_url, "http://localhost:9999/v1");
        assert_eq!(config.agent.max_iterations, 1);
        assert_eq!(config.database.default_port, "3307");
        assert_eq!(config.server.session_idle_secs, 0);

        clear_env();
    }

    #[test]
    fn test_debug_masks_api_key() {
        let llm = LlmConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", llm);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }
}
