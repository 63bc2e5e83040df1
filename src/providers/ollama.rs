//! Ollama Provider
//!
//! Local models via Ollama's OpenAI-compatible chat endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{
    http_client, status_error, ChatOptions, ConversationProvider, Message, ProviderError,
};
use crate::config::AiConfig;

const CHAT_PATH: &str = "/v1/chat/completions";

/// Tokens requested by the startup probe
const PROBE_MAX_TOKENS: usize = 10;

/// Provider for Ollama (local models)
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(config: &AiConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.request_timeout_secs))?,
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, CHAT_PATH)
    }

    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ConversationProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    /// Ollama is stateless; the persona rides on every request. Startup only
    /// checks that the server answers and the model is pulled.
    async fn initialize(&self, _persona: &str) -> Result<(), ProviderError> {
        let probe = [Message::user("Hi")];
        let options = ChatOptions {
            temperature: None,
            max_tokens: Some(PROBE_MAX_TOKENS),
        };

        self.chat(&probe, &options).await?;
        info!("Using Ollama with model: {}", self.model);
        Ok(())
    }

    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.model,
            "messages": Self::convert_messages(messages),
            "stream": false,
        });

        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(temp) = options.temperature {
            body["temperature"] = json!(temp);
        }

        debug!("Ollama request with {} messages", messages.len());

        let response = self
            .client
            .post(self.chat_url())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::Unavailable(
                        "Ollama not running. Start with: ollama serve".to_string(),
                    )
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(status_error(status, &text, &self.model));
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("No choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

// OpenAI-compatible wire types

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    choices: Vec<OllamaChoice>,
}

#[derive(Debug, Deserialize)]
struct OllamaChoice {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: Option<String>,
}
