//! Google Gemini Provider
//!
//! Stateless `generateContent` calls. The conversation client sends the whole
//! window every time, so no server-side chat session is kept.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    http_client, status_error, ChatOptions, ConversationProvider, Message, ProviderError, Role,
};
use crate::config::AiConfig;

/// Provider for Google Gemini
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl GeminiProvider {
    pub fn new(config: &AiConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::Config("GEMINI_API_KEY not configured".to_string()))?;

        Ok(Self {
            client: http_client(Duration::from_secs(config.request_timeout_secs))?,
            api_key: api_key.to_string(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Split out the persona and map roles onto Gemini's `user` / `model`
    fn build_request(&self, messages: &[Message], options: &ChatOptions) -> GenerateContentRequest {
        let mut system_instruction = None;
        let mut contents = Vec::with_capacity(messages.len());

        for message in messages {
            let role = match message.role {
                Role::System => {
                    system_instruction = Some(Content::new(None, &message.content));
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "model",
            };
            contents.push(Content::new(Some(role), &message.content));
        }

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: options.temperature.or(Some(self.temperature)),
                max_output_tokens: options.max_tokens.or(Some(self.max_tokens)),
            },
        }
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, ProviderError> {
        debug!("Making Gemini API request to: {}", self.endpoint_url());

        let response = self
            .client
            .post(self.endpoint_url())
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text, &self.model));
        }

        let gemini_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse response: {e}")))?;

        if let Some(reason) = gemini_response.block_reason() {
            warn!("Gemini response was blocked by safety filters");
            return Err(ProviderError::Blocked(reason));
        }

        gemini_response
            .text()
            .ok_or_else(|| ProviderError::Parse("Empty response from Gemini".to_string()))
    }
}

#[async_trait]
impl ConversationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    /// Open the session by sending the persona as the first user turn
    async fn initialize(&self, persona: &str) -> Result<(), ProviderError> {
        let request = self.build_request(&[Message::user(persona)], &ChatOptions::default());
        self.generate(&request).await?;
        info!("Using Google Gemini: {}", self.model);
        Ok(())
    }

    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(messages, options);
        self.generate(&request).await
    }
}

// Wire types

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn block_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Some(reason);
        }

        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|reason| *reason == "SAFETY")
            .map(str::to_string)
    }

    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
