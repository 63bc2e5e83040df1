use std::path::PathBuf;

use thiserror::Error;

use crate::conversation::ConversationError;
use crate::providers::ProviderError;
use crate::voice::{RecognitionError, SynthesisError};

/// Errors that can occur in the Jarvis application
#[derive(Error, Debug)]
pub enum JarvisError {
    /// Missing credential, unknown provider or invalid config value.
    /// Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error when reading or writing the config file
    #[error("Config file error for {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    /// Speech capture or recognition failed
    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    /// Chat provider failed during a reply
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Conversation client failed
    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    /// Text-to-speech failed
    #[error("Speech synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// HTTP server failed to bind or serve
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with JarvisError
pub type Result<T> = std::result::Result<T, JarvisError>;

impl JarvisError {
    /// Human guidance printed before the process exits on a fatal startup error
    pub fn guidance(&self) -> &'static str {
        let text = self.to_string();
        let lower = text.to_lowercase();

        if text.contains("429") || lower.contains("quota") || lower.contains("rate limit") {
            "Rate limit or quota exceeded. Wait a few minutes, or switch to a lighter model."
        } else if lower.contains("api key") || text.contains("API_KEY") {
            "Check GEMINI_API_KEY in your environment or config file."
        } else if lower.contains("ollama") {
            "Make sure Ollama is running (ollama serve) and the model is pulled (ollama pull <model>)."
        } else {
            "Check your network connection and configuration (jarvis config)."
        }
    }
}
