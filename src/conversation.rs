//! Conversation client
//!
//! Provider-agnostic chat session. The full history is kept in memory; only
//! the most recent pairs go out with each request, behind the persona.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::providers::{ChatOptions, ConversationProvider, Message, ProviderError, Role};

/// Prompt used for the startup greeting
pub const GREETING_PROMPT: &str =
    "Greet the user as JARVIS when the system starts. Keep it to 1 sentence.";

/// Greeting used when the provider cannot be reached
pub const FALLBACK_GREETING: &str = "Good day, sir. JARVIS is online and ready to assist.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversationError {
    /// Provider could not establish the session
    #[error("Failed to initialize {provider}: {source}")]
    Initialization {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// Request for a reply failed; history is unchanged
    #[error("{0}")]
    Reply(#[from] ProviderError),
}

pub struct ConversationClient {
    provider: Arc<dyn ConversationProvider>,
    persona: String,
    history: Vec<Message>,
    history_limit: usize,
    options: ChatOptions,
    state: SessionState,
}

impl ConversationClient {
    pub fn new(provider: Arc<dyn ConversationProvider>, config: &AiConfig) -> Self {
        Self {
            provider,
            persona: config.persona().to_string(),
            history: Vec::new(),
            history_limit: config.history_limit,
            options: ChatOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
            },
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Establish the provider session and move to `Ready`
    pub async fn initialize(&mut self) -> Result<(), ConversationError> {
        self.provider
            .initialize(&self.persona)
            .await
            .map_err(|source| ConversationError::Initialization {
                provider: self.provider.name().to_string(),
                source,
            })?;

        self.state = SessionState::Ready;
        info!(
            "Conversation ready ({} / {})",
            self.provider.name(),
            self.provider.model()
        );
        Ok(())
    }

    /// Drop all history and start a fresh provider session
    pub async fn reset(&mut self) -> Result<(), ConversationError> {
        self.history.clear();
        self.state = SessionState::Uninitialized;
        self.initialize().await
    }

    /// The exact message list a `reply(prompt)` would send
    pub fn outgoing_messages(&self, prompt: &str) -> Vec<Message> {
        let window = self.history_limit.saturating_mul(2);
        let skip = self.history.len().saturating_sub(window);

        let mut messages = Vec::with_capacity(window.min(self.history.len()) + 2);
        messages.push(Message::system(&self.persona));
        messages.extend(self.history[skip..].iter().cloned());
        messages.push(Message::user(prompt));
        messages
    }

    /// Ask the provider for a reply and record the exchange on success
    pub async fn reply(&mut self, prompt: &str) -> Result<String, ConversationError> {
        if self.state == SessionState::Uninitialized {
            self.initialize().await?;
        }

        let messages = self.outgoing_messages(prompt);
        debug!(
            "Sending {} messages to {}",
            messages.len(),
            self.provider.name()
        );

        let text = self.provider.chat(&messages, &self.options).await?;

        self.history.push(Message::user(prompt));
        self.history.push(Message::assistant(&text));
        Ok(text)
    }

    /// One-line greeting, or a fixed line when the provider fails
    pub async fn greet(&mut self) -> String {
        match self.reply(GREETING_PROMPT).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Greeting failed: {}", e);
                FALLBACK_GREETING.to_string()
            }
        }
    }

    /// Number of user turns recorded
    pub fn turns(&self) -> usize {
        self.history.iter().filter(|m| m.role == Role::User).count()
    }
}
