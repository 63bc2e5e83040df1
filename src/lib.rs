//! # Jarvis
//!
//! A desktop voice assistant for the terminal. Spoken or typed commands are
//! matched against a small keyword table (open an application or website,
//! tell the time or date); everything else goes to a Gemini or Ollama chat
//! model. Replies are shown in an animated ratatui window and spoken aloud.

pub mod animation;
pub mod assistant;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod providers;
pub mod runtime;
pub mod server;
pub mod ui;
pub mod voice;

pub use assistant::{Brain, CommandReply};
pub use config::JarvisConfig;
pub use errors::{JarvisError, Result};
pub use runtime::{Runtime, UiEvent};
