//! The assistant brain: command dispatch in front of the conversation client

use std::sync::Arc;

use tracing::{error, info};

use crate::commands::{normalize, Dispatcher, SystemActions};
use crate::config::JarvisConfig;
use crate::conversation::{ConversationClient, ConversationError};
use crate::errors::{JarvisError, Result};
use crate::providers::{create_provider, ProviderError};

/// Result of processing one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub text: String,
    pub command_executed: bool,
}

pub struct Brain {
    dispatcher: Dispatcher,
    conversation: ConversationClient,
}

impl Brain {
    pub fn new(dispatcher: Dispatcher, conversation: ConversationClient) -> Self {
        Self {
            dispatcher,
            conversation,
        }
    }

    /// Provider and command table from config, wired to the real OS.
    /// Does not contact the provider; call [`Brain::initialize`] for that.
    pub fn from_config(config: &JarvisConfig) -> Result<Self> {
        let provider = create_provider(&config.ai).map_err(|e| match e {
            ProviderError::Config(msg) => JarvisError::Configuration(msg),
            other => JarvisError::Provider(other),
        })?;

        Ok(Self::new(
            Dispatcher::new(config.command_table(), Arc::new(SystemActions)),
            ConversationClient::new(provider, &config.ai),
        ))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn conversation(&self) -> &ConversationClient {
        &self.conversation
    }

    pub async fn initialize(&mut self) -> Result<()> {
        self.conversation.initialize().await?;
        Ok(())
    }

    /// Run any matching command, then get the spoken reply.
    ///
    /// Never fails: provider errors become an apology.
    pub async fn process_command(&mut self, input: &str) -> CommandReply {
        let normalized = normalize(input);
        let dispatched = self.dispatcher.dispatch_command(&normalized);
        let command_executed = dispatched.is_some();

        if let Some(reply) = dispatched.as_ref().and_then(|d| d.local_reply.clone()) {
            return CommandReply {
                text: reply,
                command_executed,
            };
        }

        let prompt = match &dispatched {
            Some(d) => {
                info!("Executed command: {}", d.name);
                confirmation_prompt(input)
            }
            None => input.trim().to_string(),
        };

        match self.conversation.reply(&prompt).await {
            Ok(text) => CommandReply {
                text,
                command_executed,
            },
            Err(e) => {
                error!("AI response error: {}", e);
                CommandReply {
                    text: apology(&e),
                    command_executed,
                }
            }
        }
    }

    pub async fn greeting(&mut self) -> String {
        self.conversation.greet().await
    }

    pub async fn reset(&mut self) -> std::result::Result<(), ConversationError> {
        self.conversation.reset().await
    }
}

pub fn confirmation_prompt(input: &str) -> String {
    format!(
        "User said: '{}'. I've executed the command. Give a brief 1-sentence confirmation.",
        input.trim()
    )
}

pub fn apology(err: &dyn std::fmt::Display) -> String {
    format!("I apologize, sir. I encountered an error: {err}")
}
