//! Application state and main loop
//!
//! The loop owns every widget: animation state steps on the tick, and worker
//! results arrive as `UiEvent`s drained before each draw.

use std::time::Instant;

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::render;
use super::terminal::Tui;
use crate::animation::{AnimationEngine, FadeController, Rgb, WaveformGenerator};
use crate::config::{AnimationConfig, JarvisConfig, ThemeConfig};
use crate::runtime::{Author, Runtime, Status, UiEvent};

/// One line of the conversation log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub speaker: Author,
    pub text: String,
}

pub struct App {
    pub should_quit: bool,

    pub status: Status,
    pub listening: bool,
    pub speaking: bool,

    pub messages: Vec<LogLine>,
    /// Lines scrolled up from the bottom
    pub scroll: u16,

    pub input: String,
    /// Cursor position in chars
    pub cursor: usize,

    /// "provider:model" shown in the title bar
    pub label: String,

    pub theme: ThemeConfig,
    pub animation: AnimationConfig,

    engine: AnimationEngine,
    pub waveform: WaveformGenerator,
    fade: FadeController,
    pub pulse: f64,
    /// Reactor glow for the current pulse
    pub glow: Rgb,
    pub angle: f64,
    pub alpha: f64,
    closing: bool,

    runtime: Runtime,
    tx: UnboundedSender<UiEvent>,
    rx: UnboundedReceiver<UiEvent>,
    last_tick: Instant,
}

impl App {
    pub fn new(runtime: Runtime, config: &JarvisConfig, label: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            should_quit: false,
            status: Status::Online,
            listening: false,
            speaking: false,
            messages: Vec::new(),
            scroll: 0,
            input: String::new(),
            cursor: 0,
            label,
            theme: config.theme.clone(),
            animation: config.animation.clone(),
            engine: AnimationEngine::new(),
            waveform: WaveformGenerator::new(config.animation.waveform_bars),
            fade: FadeController::new(config.animation.fade()),
            pulse: 1.0,
            glow: config.theme.glow,
            angle: 0.0,
            alpha: 0.0,
            closing: false,
            runtime,
            tx,
            rx,
            last_tick: Instant::now(),
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.runtime.voice_enabled()
    }

    /// Greet, fade in, then loop until closed
    pub fn run(&mut self, terminal: &mut Tui) -> Result<()> {
        self.fade.start_fade_in();
        self.runtime.greet(self.tx.clone());

        let tick = self.animation.tick();

        while !self.should_quit {
            self.process_events();

            terminal.draw(|frame| self.draw(frame))?;

            let timeout = tick.saturating_sub(self.last_tick.elapsed());
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.last_tick.elapsed() >= tick {
                self.on_tick();
                self.last_tick = Instant::now();
            }
        }

        self.runtime.stop_speaking();
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        render::render(frame, self);
    }

    /// Apply every pending worker event
    pub fn process_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
        }
    }

    pub fn apply(&mut self, event: UiEvent) {
        debug!("UI event: {:?}", event);
        match event {
            UiEvent::Status(status) => self.status = status,
            UiEvent::Message { speaker, text } => {
                self.messages.push(LogLine { speaker, text });
                self.scroll = 0;
            }
            UiEvent::ListeningChanged(on) => self.listening = on,
            UiEvent::SpeakingChanged(on) => self.speaking = on,
        }
    }

    /// Step every animation by one frame
    pub fn on_tick(&mut self) {
        self.pulse = self.engine.pulse_intensity(self.animation.pulse_period_secs);
        self.glow = self.engine.glow_color(self.theme.glow, self.pulse);
        self.angle = self.engine.rotation_angle();
        self.waveform.update(self.listening || self.speaking);

        if let Some(alpha) = self.fade.current_alpha() {
            self.alpha = alpha;
        }

        if self.closing && self.fade.is_complete() {
            self.should_quit = true;
        }
    }

    /// Theme color faded toward the background by the current alpha
    pub fn tint(&self, color: Rgb) -> ratatui::style::Color {
        color.blend(self.theme.background, self.alpha).to_ratatui()
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.closing {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.should_quit = true,
                KeyCode::Char('s') => self.runtime.stop_speaking(),
                KeyCode::Char('r') => self.runtime.reset(self.tx.clone()),
                KeyCode::Char('y') => self.copy_last_reply(),
                KeyCode::Char('l') => {
                    self.messages.clear();
                    self.scroll = 0;
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Tab => self.start_listening(),
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index();
                    self.input.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.input.chars().count() {
                    let at = self.byte_index();
                    self.input.remove(at);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.input.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.chars().count(),
            KeyCode::Up => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Down => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_add(10),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::Char(c) => {
                let at = self.byte_index();
                self.input.insert(at, c);
                self.cursor += 1;
            }
            _ => {}
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn start_listening(&mut self) {
        if !self.voice_enabled() {
            self.apply(UiEvent::Message {
                speaker: Author::System,
                text: "Voice input is not configured. Type your command instead.".to_string(),
            });
            return;
        }
        self.runtime.start_listening(self.tx.clone());
    }

    fn submit(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }

        if self.runtime.submit_text(&self.input, self.tx.clone()) {
            self.input.clear();
            self.cursor = 0;
        }
    }

    /// Stop speech and fade out; the loop exits when the fade completes
    fn close(&mut self) {
        self.runtime.stop_speaking();
        self.closing = true;
        self.fade.start_fade_out();
    }

    fn copy_last_reply(&mut self) {
        let Some(line) = self
            .messages
            .iter()
            .rev()
            .find(|m| m.speaker == Author::Jarvis)
        else {
            return;
        };

        match arboard::Clipboard::new().and_then(|mut c| c.set_text(line.text.clone())) {
            Ok(()) => debug!("Copied last reply"),
            Err(e) => warn!("Clipboard unavailable: {}", e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::assistant::Brain;
    use crate::commands::Dispatcher;
    use crate::config::AiConfig;
    use crate::conversation::testing::ScriptedProvider;
    use crate::conversation::ConversationClient;
    use crate::voice::{DisabledListener, MutedSpeaker};

    pub(crate) fn test_app() -> App {
        let mut config = JarvisConfig::sensible_defaults();
        config.animation.fade_secs = 0.0;

        let brain = Brain::new(
            Dispatcher::system(),
            ConversationClient::new(Arc::new(ScriptedProvider::default()), &AiConfig::default()),
        );
        let runtime = Runtime::new(brain, Arc::new(DisabledListener), Arc::new(MutedSpeaker));
        App::new(runtime, &config, "scripted:test-model".to_string())
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_app_new() {
        let app = test_app();
        assert!(!app.should_quit);
        assert_eq!(app.status, Status::Online);
        assert_eq!(app.waveform.len(), 40);
    }

    #[test]
    fn test_glow_follows_pulse() {
        let mut app = test_app();
        assert_eq!(app.glow, app.theme.glow);

        app.on_tick();
        assert_eq!(app.glow, app.theme.glow.scaled(app.pulse));
    }

    #[test]
    fn test_editing_handles_multibyte() {
        let mut app = test_app();
        for c in "olá".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input, "oá");
        assert_eq!(app.cursor, 1);

        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Char('!'));
        assert_eq!(app.input, "oá!");
    }

    #[test]
    fn test_events_update_state() {
        let mut app = test_app();
        app.scroll = 3;
        app.apply(UiEvent::ListeningChanged(true));
        app.apply(UiEvent::Status(Status::Listening));
        app.apply(UiEvent::Message {
            speaker: Author::You,
            text: "open github".to_string(),
        });

        assert!(app.listening);
        assert_eq!(app.status, Status::Listening);
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn test_tab_without_voice_explains() {
        let mut app = test_app();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.messages[0].speaker, Author::System);
        assert!(!app.listening);
    }

    #[test]
    fn test_waveform_follows_activity() {
        let mut app = test_app();
        app.apply(UiEvent::SpeakingChanged(true));
        app.on_tick();
        assert!(app.waveform.heights().iter().all(|h| *h >= 0.3));

        app.apply(UiEvent::SpeakingChanged(false));
        for _ in 0..60 {
            app.on_tick();
        }
        assert!(app.waveform.heights().iter().all(|h| (*h - 0.1).abs() < 1e-9));
    }

    #[test]
    fn test_escape_fades_out_then_quits() {
        let mut app = test_app();
        app.alpha = 1.0;

        press(&mut app, KeyCode::Esc);
        assert!(!app.should_quit);

        app.on_tick();
        assert_eq!(app.alpha, 0.0);
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_enter_submits_typed_command() {
        let mut app = test_app();
        for c in "hello".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert!(app.input.is_empty());

        let deadline = Instant::now() + Duration::from_secs(5);
        while app.messages.len() < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
            app.process_events();
        }

        assert_eq!(app.messages[0].text, "hello");
        assert_eq!(app.messages[1].speaker, Author::Jarvis);
        assert_eq!(app.messages[1].text, "Certainly, sir.");
    }
}
