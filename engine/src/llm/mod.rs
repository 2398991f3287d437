//! LLM Provider Abstraction Layer
//!
//! A common interface over the text-completion services the planner,
//! the response synthesizer and the text-to-SQL compiler talk to. Providers
//! return the raw completion text; interpreting it is the caller's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::LLMConfig;
use sdk::errors::EngineError;

pub mod ollama;
pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::RateLimitExceeded => EngineError::RateLimited,
            LLMError::Timeout => EngineError::LLMTimeout,
            LLMError::NetworkError(e) => EngineError::Network(e),
            other => EngineError::LLMProvider(other.to_string()),
        }
    }
}

/// Map a transport-level reqwest failure to an `LLMError`
pub(crate) fn transport_error(err: reqwest::Error, provider: &str, base_url: &str) -> LLMError {
    if err.is_timeout() {
        LLMError::Timeout
    } else if err.is_connect() {
        LLMError::ProviderUnavailable(format!("Cannot connect to {} at {}", provider, base_url))
    } else {
        LLMError::NetworkError(err.to_string())
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openai")
    fn name(&self) -> &str;

    /// Generate a completion for the conversation
    ///
    /// # Arguments
    /// * `messages` - System instructions followed by the conversation
    ///
    /// # Returns
    /// * `Ok(String)` - The raw completion text
    /// * `Err(LLMError)` - If the request fails
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Check if the provider is currently healthy and available
    async fn check_health(&self) -> bool {
        true
    }
}

/// Build the configured default provider.
///
/// The OpenAI key is read from the environment variable named in config. A
/// missing key is not an error here; the provider reports
/// `AuthenticationFailed` on first use and an unhealthy `check_health`.
pub fn build_provider(config: &LLMConfig) -> std::result::Result<Arc<dyn LLMProvider>, EngineError> {
    match config.default_provider.as_str() {
        "openai" => {
            let api_key = std::env::var(&config.openai.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty());
            let provider = openai::OpenAIProvider::new(
                config.openai.clone(),
                api_key,
                config.temperature,
                config.timeout(),
            )?;
            Ok(Arc::new(provider))
        }
        "ollama" => {
            let provider = ollama::OllamaProvider::new(
                config.ollama.base_url.clone(),
                config.ollama.model.clone(),
                config.temperature,
                config.timeout(),
            )?;
            Ok(Arc::new(provider))
        }
        other => Err(EngineError::Config(format!(
            "Unknown LLM provider '{}'",
            other
        ))),
    }
}
