//! Jarvis Configuration
//!
//! Persistent TOML configuration with environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::animation::Rgb;
use crate::commands::{default_table, CommandEntry, CommandTable};
use crate::errors::{JarvisError, Result};

/// Default persona sent as the system prompt
pub const DEFAULT_PERSONA: &str = r#"You are JARVIS, an advanced AI assistant inspired by Iron Man's AI companion.

Personality traits:
- Professional, helpful, and efficient
- Concise responses (2-3 sentences max unless asked for details)
- Slightly formal but friendly
- Use phrases like "Certainly, sir" or "Right away" when appropriate
- Never use emojis in responses

Capabilities:
- Answer questions with intelligence and context
- Execute system commands (open apps, websites)
- Provide time, date, and information
- Maintain conversation context

When the user asks to open something or execute a command, acknowledge it briefly and confirm the action."#;

/// Which chat backend is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Gemini => "gemini",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ollama" => Some(ProviderKind::Ollama),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: ProviderKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,

    pub gemini_model: String,

    pub gemini_base_url: String,

    pub ollama_model: String,

    pub ollama_base_url: String,

    /// Sampling temperature
    pub temperature: f32,

    pub max_tokens: usize,

    /// Conversation pairs sent with each request
    pub history_limit: usize,

    pub request_timeout_secs: u64,

    /// Override for the built-in persona
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            ollama_model: "llama3.2".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            history_limit: 10,
            request_timeout_secs: 30,
            persona: None,
        }
    }
}

impl AiConfig {
    pub fn persona(&self) -> &str {
        self.persona.as_deref().unwrap_or(DEFAULT_PERSONA)
    }

    /// Model of the active provider
    pub fn active_model(&self) -> &str {
        match self.provider {
            ProviderKind::Ollama => &self.ollama_model,
            ProviderKind::Gemini => &self.gemini_model,
        }
    }

    /// Set the model of the active provider
    pub fn set_active_model(&mut self, model: &str) {
        match self.provider {
            ProviderKind::Ollama => self.ollama_model = model.to_string(),
            ProviderKind::Gemini => self.gemini_model = model.to_string(),
        }
    }
}

/// Window colors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub background: Rgb,
    pub panel: Rgb,
    pub text: Rgb,
    pub glow: Rgb,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary: Rgb::new(0x00, 0xd4, 0xff),
            secondary: Rgb::new(0x7b, 0x2f, 0xf7),
            background: Rgb::new(0x0a, 0x0e, 0x27),
            panel: Rgb::new(0x1a, 0x1e, 0x3a),
            text: Rgb::WHITE,
            glow: Rgb::new(0x00, 0xff, 0xff),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Seconds per pulse cycle
    pub pulse_period_secs: f64,
    pub reactor_rings: usize,
    pub waveform_bars: usize,
    pub tick_ms: u64,
    pub fade_secs: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            pulse_period_secs: 2.0,
            reactor_rings: 3,
            waveform_bars: 40,
            tick_ms: 50,
            fade_secs: 0.3,
        }
    }
}

impl AnimationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn fade(&self) -> Duration {
        Duration::try_from_secs_f64(self.fade_secs).unwrap_or(crate::animation::DEFAULT_FADE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Seconds to wait for speech to begin
    pub timeout_secs: u64,
    /// Maximum length of one phrase
    pub phrase_limit_secs: u64,
    /// Words per minute
    pub tts_rate: u32,
    /// Recognizer argv; its stdout is the transcript. Voice input is
    /// disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_command: Option<Vec<String>>,
    /// Synthesizer argv; the text is appended as the last argument
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speak_command: Option<Vec<String>>,
    pub muted: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            phrase_limit_secs: 10,
            tts_rate: 175,
            listen_command: None,
            speak_command: None,
            muted: false,
        }
    }
}

impl VoiceConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs + self.phrase_limit_secs)
    }

    pub fn input_enabled(&self) -> bool {
        self.listen_command
            .as_ref()
            .is_some_and(|argv| !argv.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JarvisConfig {
    pub ai: AiConfig,
    pub theme: ThemeConfig,
    pub animation: AnimationConfig,
    pub voice: VoiceConfig,
    pub server: ServerConfig,

    /// Replaces the built-in command table when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<CommandEntry>>,
}

impl JarvisConfig {
    pub fn sensible_defaults() -> Self {
        Self::default()
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "jarvis", "jarvis")
    }

    pub fn config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Data directory (log file)
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::data_dir().map(|dir| dir.join("jarvis.log"))
    }

    /// Load from `path`, or from the default location when `None`, then apply
    /// environment overrides. A missing default file yields the defaults; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => Self::sensible_defaults(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| JarvisError::ConfigFile {
            path: path.to_path_buf(),
            message: format!("Failed to read config: {e}"),
        })?;

        toml::from_str(&content).map_err(|e| JarvisError::ConfigFile {
            path: path.to_path_buf(),
            message: format!("Invalid TOML config: {e}"),
        })
    }

    /// Write to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| JarvisError::ConfigFile {
                path: parent.to_path_buf(),
                message: format!("Failed to create config dir: {e}"),
            })?;
        }

        let content = self.to_toml()?;
        fs::write(path, content).map_err(|e| JarvisError::ConfigFile {
            path: path.to_path_buf(),
            message: format!("Failed to write config: {e}"),
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| JarvisError::Configuration(format!("Failed to serialize config: {e}")))
    }

    /// Apply `AI_PROVIDER`, `GEMINI_API_KEY` and `OLLAMA_MODEL`. Empty values
    /// and unknown provider names are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("AI_PROVIDER") {
            match ProviderKind::parse(&provider) {
                Some(kind) => self.ai.provider = kind,
                None => tracing::warn!("Ignoring unknown AI_PROVIDER: {}", provider),
            }
        }

        if let Some(key) = get("GEMINI_API_KEY") {
            self.ai.gemini_api_key = Some(key);
        }

        if let Some(model) = get("OLLAMA_MODEL") {
            self.ai.ollama_model = model;
        }
    }

    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        let has_key = self
            .ai
            .gemini_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());

        if self.ai.provider == ProviderKind::Gemini && !has_key {
            return Err(JarvisError::Configuration(
                "GEMINI_API_KEY not configured. Get a free key at https://aistudio.google.com/app/apikey"
                    .to_string(),
            ));
        }

        if self.ai.history_limit == 0 {
            return Err(JarvisError::Configuration(
                "ai.history_limit must be at least 1".to_string(),
            ));
        }

        if self.animation.waveform_bars == 0 {
            return Err(JarvisError::Configuration(
                "animation.waveform_bars must be at least 1".to_string(),
            ));
        }

        if self.animation.tick_ms == 0 {
            return Err(JarvisError::Configuration(
                "animation.tick_ms must be at least 1".to_string(),
            ));
        }

        if !self.animation.fade_secs.is_finite() || self.animation.fade_secs < 0.0 {
            return Err(JarvisError::Configuration(
                "animation.fade_secs must be a non-negative number".to_string(),
            ));
        }

        if self.commands.as_ref().is_some_and(Vec::is_empty) {
            return Err(JarvisError::Configuration(
                "commands table is present but empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Command table from config, or the built-in defaults
    pub fn command_table(&self) -> CommandTable {
        match &self.commands {
            Some(entries) => CommandTable::new(entries.clone()),
            None => default_table(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_sensible_defaults() {
        let config = JarvisConfig::sensible_defaults();
        assert_eq!(config.ai.provider, ProviderKind::Ollama);
        assert_eq!(config.ai.ollama_model, "llama3.2");
        assert_eq!(config.ai.gemini_model, "gemini-1.5-flash");
        assert_eq!(config.ai.history_limit, 10);
        assert_eq!(config.theme.primary.to_hex(), "#00d4ff");
        assert_eq!(config.theme.background.to_hex(), "#0a0e27");
        assert_eq!(config.animation.waveform_bars, 40);
        assert_eq!(config.animation.tick(), Duration::from_millis(50));
        assert_eq!(config.server.addr(), "0.0.0.0:5000");
        assert!(!config.voice.input_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = JarvisConfig::sensible_defaults();
        config.ai.provider = ProviderKind::Gemini;
        config.ai.gemini_api_key = Some("abc".to_string());
        config.theme.glow = Rgb::from_hex("#112233").unwrap();
        config.voice.listen_command = Some(vec!["whisper-listen".to_string()]);
        config.save(&path).unwrap();

        let loaded = JarvisConfig::load_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[ai]\nprovider = \"gemini\"\ngemini_api_key = \"k\"\n\n[server]\nport = 8080\n",
        )
        .unwrap();

        let config = JarvisConfig::load_file(&path).unwrap();
        assert_eq!(config.ai.provider, ProviderKind::Gemini);
        assert_eq!(config.ai.temperature, 0.7);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_hex_rejected_at_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[theme]\nprimary = \"#zzzzzz\"\n").unwrap();

        let err = JarvisConfig::load_file(&path).unwrap_err();
        assert!(matches!(err, JarvisError::ConfigFile { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = JarvisConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(JarvisError::ConfigFile { .. })));
    }

    #[test]
    fn test_gemini_without_key_invalid() {
        let mut config = JarvisConfig::sensible_defaults();
        config.ai.provider = ProviderKind::Gemini;
        assert!(matches!(config.validate(), Err(JarvisError::Configuration(_))));

        config.ai.gemini_api_key = Some("  ".to_string());
        assert!(config.validate().is_err());

        config.ai.gemini_api_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_invalid() {
        let mut config = JarvisConfig::sensible_defaults();
        config.ai.history_limit = 0;
        assert!(config.validate().is_err());

        let mut config = JarvisConfig::sensible_defaults();
        config.animation.waveform_bars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("AI_PROVIDER", "Gemini"),
            ("GEMINI_API_KEY", "secret"),
            ("OLLAMA_MODEL", "mistral"),
        ]);
        let mut config = JarvisConfig::sensible_defaults();
        config.apply_overrides(|key| vars.get(key).cloned());

        assert_eq!(config.ai.provider, ProviderKind::Gemini);
        assert_eq!(config.ai.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.ai.ollama_model, "mistral");
    }

    #[test]
    fn test_unknown_or_empty_env_ignored() {
        let vars = env(&[("AI_PROVIDER", "openai"), ("OLLAMA_MODEL", "")]);
        let mut config = JarvisConfig::sensible_defaults();
        config.apply_overrides(|key| vars.get(key).cloned());

        assert_eq!(config.ai.provider, ProviderKind::Ollama);
        assert_eq!(config.ai.ollama_model, "llama3.2");
    }

    #[test]
    fn test_active_model() {
        let mut ai = AiConfig::default();
        ai.set_active_model("phi3");
        assert_eq!(ai.ollama_model, "phi3");

        ai.provider = ProviderKind::Gemini;
        assert_eq!(ai.active_model(), "gemini-1.5-flash");
        assert!(ai.persona().starts_with("You are JARVIS"));
    }

    #[test]
    fn test_command_table_override() {
        let raw = r#"
[[commands]]
name = "docs"
keywords = ["docs"]
qualifiers = ["open"]
action = { type = "open_url", url = "https://docs.rs" }
"#;
        let config: JarvisConfig = toml::from_str(raw).unwrap();
        let table = config.command_table();
        assert_eq!(table.commands.len(), 1);
        assert!(table.find("open docs").is_some());
        assert!(table.find("open youtube").is_none());

        assert_eq!(
            JarvisConfig::sensible_defaults().command_table(),
            default_table()
        );
    }
}
