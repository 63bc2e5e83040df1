//! Chat provider abstraction.
//!
//! Two interchangeable backends sit behind [`ConversationProvider`]:
//! - Gemini (hosted, API key)
//! - Ollama (local model server)
//!
//! Exactly one is active per process, chosen from config at startup.

mod gemini;
mod ollama;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use crate::config::{AiConfig, ProviderKind};

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Sampling options for one request
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// A chat backend
#[async_trait]
pub trait ConversationProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Model used for requests
    fn model(&self) -> &str;

    /// Establish the session: deliver the persona or probe the server.
    /// Called once at startup and again on every conversation reset.
    async fn initialize(&self, persona: &str) -> Result<(), ProviderError>;

    /// Send the full request (system persona first) and return the reply text
    async fn chat(&self, messages: &[Message], options: &ChatOptions)
        -> Result<String, ProviderError>;
}

/// Provider errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limit exceeded (429): quota or request limit reached")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response blocked by safety filters: {0}")]
    Blocked(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn status_error(status: StatusCode, body: &str, model: &str) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::InvalidApiKey,
        StatusCode::NOT_FOUND => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::Api(format!("{status}: {body}")),
    }
}

/// Shared HTTP client with the configured request timeout
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("jarvis/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Build the one provider selected by config
pub fn create_provider(config: &AiConfig) -> Result<Arc<dyn ConversationProvider>, ProviderError> {
    match config.provider {
        ProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(config)?)),
        ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::new(config)?)),
    }
}
