//! Voice seams
//!
//! Capture, recognition and synthesis are delegated to external programs:
//! - [`Listener`]: a recognizer command whose stdout is the transcript
//! - [`Speaker`]: a synthesizer command (`say`, `espeak-ng`, ...)
//!
//! Disabled and muted fallbacks keep the rest of the assistant working on
//! machines without either.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;

/// Speech recognition failures. All are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    #[error("No speech detected")]
    NoSpeech,

    #[error("Could not understand audio")]
    Unintelligible,

    #[error("Voice features not available: {0}")]
    Unavailable(String),

    /// Another capture or reply is already in flight
    #[error("Busy")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("Nothing to speak")]
    EmptyText,

    #[error("Synthesizer not available: {0}")]
    Unavailable(String),

    #[error("Synthesizer failed: {0}")]
    Failed(String),
}

/// Speech-to-text source
#[async_trait]
pub trait Listener: Send + Sync {
    /// Capture one phrase and return its transcript
    async fn listen(&self) -> Result<String, RecognitionError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Text-to-speech sink
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text`, returning when playback ends or is stopped
    async fn speak(&self, text: &str) -> Result<(), SynthesisError>;

    /// Interrupt the current utterance, if any
    fn stop(&self);
}

/// Listener used when no recognizer is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledListener;

#[async_trait]
impl Listener for DisabledListener {
    async fn listen(&self) -> Result<String, RecognitionError> {
        Err(RecognitionError::Unavailable(
            "no listen_command configured".to_string(),
        ))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Runs a recognizer program per phrase
#[derive(Debug, Clone)]
pub struct CommandListener {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandListener {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }
}

#[async_trait]
impl Listener for CommandListener {
    async fn listen(&self) -> Result<String, RecognitionError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| RecognitionError::Unavailable("empty listen_command".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Listening via {}", program);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(RecognitionError::Unavailable(format!("{program}: {e}"))),
            Err(_) => {
                debug!("Recognizer timed out after {:?}", self.timeout);
                return Err(RecognitionError::NoSpeech);
            }
        };

        if !output.status.success() {
            debug!(
                "Recognizer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(RecognitionError::Unintelligible);
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if transcript.is_empty() {
            return Err(RecognitionError::NoSpeech);
        }

        info!("Recognized: {}", transcript);
        Ok(transcript)
    }
}

/// Speaker that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct MutedSpeaker;

#[async_trait]
impl Speaker for MutedSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        debug!("Muted, not speaking: {}", text);
        Ok(())
    }

    fn stop(&self) {}
}

/// Runs a synthesizer program with the text as its last argument
pub struct CommandSpeaker {
    argv: Vec<String>,
    current: Mutex<Option<Arc<Notify>>>,
}

impl CommandSpeaker {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            current: Mutex::new(None),
        }
    }

    /// `say` on macOS, `espeak-ng` elsewhere
    pub fn platform_default(rate: u32) -> Self {
        let program = if cfg!(target_os = "macos") {
            ["say", "-r"]
        } else {
            ["espeak-ng", "-s"]
        };
        Self::new(vec![
            program[0].to_string(),
            program[1].to_string(),
            rate.to_string(),
        ])
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn register(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        if let Ok(mut current) = self.current.lock() {
            *current = Some(notify.clone());
        }
        notify
    }

    fn clear(&self, notify: &Arc<Notify>) {
        if let Ok(mut current) = self.current.lock() {
            if current.as_ref().is_some_and(|n| Arc::ptr_eq(n, notify)) {
                *current = None;
            }
        }
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| SynthesisError::Unavailable("empty speak_command".to_string()))?;

        // Registered first so a stop issued during spawn is not lost
        let stop = self.register();

        let spawned = Command::new(program)
            .args(args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.clear(&stop);
                return Err(SynthesisError::Unavailable(format!("{program}: {e}")));
            }
        };

        let result = tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(SynthesisError::Failed(format!("{program} exited with {status}"))),
                Err(e) => Err(SynthesisError::Failed(e.to_string())),
            },
            () = stop.notified() => {
                debug!("Speech interrupted");
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop synthesizer: {}", e);
                }
                Ok(())
            }
        };

        self.clear(&stop);
        result
    }

    fn stop(&self) {
        let current = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some(notify) = current {
            // notify_one keeps a permit if speak has not started waiting yet
            notify.notify_one();
        }
    }
}

/// Recognizer from config, or the disabled fallback
pub fn create_listener(config: &VoiceConfig) -> Arc<dyn Listener> {
    match &config.listen_command {
        Some(argv) if !argv.is_empty() => Arc::new(CommandListener::new(
            argv.clone(),
            config.listen_timeout(),
        )),
        _ => {
            info!("Voice input disabled (no listen_command)");
            Arc::new(DisabledListener)
        }
    }
}

/// Synthesizer from config, the platform default, or muted
pub fn create_speaker(config: &VoiceConfig) -> Arc<dyn Speaker> {
    if config.muted {
        return Arc::new(MutedSpeaker);
    }

    match &config.speak_command {
        Some(argv) if !argv.is_empty() => Arc::new(CommandSpeaker::new(argv.clone())),
        _ => Arc::new(CommandSpeaker::platform_default(config.tts_rate)),
    }
}
