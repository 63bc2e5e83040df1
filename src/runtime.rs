//! Interaction runtime
//!
//! Runs listen → recognize → dispatch/reply → display → speak on tokio tasks.
//! Workers never touch UI state: progress is posted as [`UiEvent`]s over an
//! unbounded channel that the UI loop drains every tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::assistant::{Brain, CommandReply};
use crate::voice::{Listener, RecognitionError, Speaker};

/// Who a log line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    You,
    Jarvis,
    System,
}

impl Author {
    pub fn label(&self) -> &'static str {
        match self {
            Author::You => "YOU",
            Author::Jarvis => "JARVIS",
            Author::System => "SYSTEM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Online,
    Listening,
    Processing,
    Speaking,
    NoSpeech,
    NotUnderstood,
    Error,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Online => "SYSTEM ONLINE",
            Status::Listening => "LISTENING...",
            Status::Processing => "PROCESSING...",
            Status::Speaking => "SPEAKING...",
            Status::NoSpeech => "NO SPEECH DETECTED",
            Status::NotUnderstood => "COULD NOT UNDERSTAND",
            Status::Error => "ERROR",
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Status::NoSpeech | Status::NotUnderstood | Status::Error)
    }
}

/// Progress posted from worker tasks to the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Status(Status),
    Message { speaker: Author, text: String },
    ListeningChanged(bool),
    SpeakingChanged(bool),
}

impl UiEvent {
    fn message(speaker: Author, text: impl Into<String>) -> Self {
        UiEvent::Message {
            speaker,
            text: text.into(),
        }
    }
}

fn post(tx: &UnboundedSender<UiEvent>, event: UiEvent) {
    if tx.send(event).is_err() {
        debug!("UI event dropped, receiver closed");
    }
}

struct SlotGuard<'a>(&'a AtomicBool);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the brain and voice seams; cheap to clone into tasks
#[derive(Clone)]
pub struct Runtime {
    brain: Arc<Mutex<Brain>>,
    listener: Arc<dyn Listener>,
    speaker: Arc<dyn Speaker>,
    /// A voice or typed interaction is in flight
    listening: Arc<AtomicBool>,
    speaking: Arc<AtomicBool>,
    /// Stop requested before the speaker started
    stop_requested: Arc<AtomicBool>,
}

impl Runtime {
    pub fn new(brain: Brain, listener: Arc<dyn Listener>, speaker: Arc<dyn Speaker>) -> Self {
        Self {
            brain: Arc::new(Mutex::new(brain)),
            listener,
            speaker,
            listening: Arc::new(AtomicBool::new(false)),
            speaking: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn brain(&self) -> &Arc<Mutex<Brain>> {
        &self.brain
    }

    pub fn voice_enabled(&self) -> bool {
        self.listener.is_enabled()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Claim the interaction slot; fails while listening or speaking
    fn try_begin(&self) -> bool {
        if self.is_speaking() {
            return false;
        }
        self.listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn finish(&self, tx: &UnboundedSender<UiEvent>, voice: bool) {
        self.listening.store(false, Ordering::SeqCst);
        if voice {
            post(tx, UiEvent::ListeningChanged(false));
        }
        if !self.is_speaking() {
            post(tx, UiEvent::Status(Status::Online));
        }
    }

    /// Start one voice interaction. Returns `false` when rejected.
    pub fn start_listening(&self, tx: UnboundedSender<UiEvent>) -> bool {
        if !self.try_begin() {
            debug!("Listen rejected, interaction in flight");
            return false;
        }

        post(&tx, UiEvent::ListeningChanged(true));
        post(&tx, UiEvent::Status(Status::Listening));

        let runtime = self.clone();
        tokio::spawn(async move {
            match runtime.listener.listen().await {
                Ok(command) => {
                    post(&tx, UiEvent::Status(Status::Processing));
                    post(&tx, UiEvent::message(Author::You, command.clone()));
                    runtime.respond(&command, &tx).await;
                }
                Err(RecognitionError::NoSpeech) => {
                    post(&tx, UiEvent::Status(Status::NoSpeech));
                    post(
                        &tx,
                        UiEvent::message(Author::System, "No speech detected. Please try again."),
                    );
                }
                Err(RecognitionError::Unintelligible) => {
                    post(&tx, UiEvent::Status(Status::NotUnderstood));
                    post(
                        &tx,
                        UiEvent::message(
                            Author::System,
                            "Could not understand audio. Please speak clearly.",
                        ),
                    );
                }
                Err(e) => {
                    post(&tx, UiEvent::Status(Status::Error));
                    post(&tx, UiEvent::message(Author::System, format!("Error: {e}")));
                }
            }
            runtime.finish(&tx, true);
        });

        true
    }

    /// Typed input; the same pipeline without capture
    pub fn submit_text(&self, text: &str, tx: UnboundedSender<UiEvent>) -> bool {
        let text = text.trim().to_string();
        if text.is_empty() || !self.try_begin() {
            return false;
        }

        post(&tx, UiEvent::Status(Status::Processing));
        post(&tx, UiEvent::message(Author::You, text.clone()));

        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.respond(&text, &tx).await;
            runtime.finish(&tx, false);
        });

        true
    }

    async fn respond(&self, command: &str, tx: &UnboundedSender<UiEvent>) {
        let reply = self.process(command).await;
        post(tx, UiEvent::message(Author::Jarvis, reply.text.clone()));
        self.speak(&reply.text, tx.clone());
    }

    /// Dispatch and reply without UI events (CLI `ask`, HTTP)
    pub async fn process(&self, command: &str) -> CommandReply {
        self.brain.lock().await.process_command(command).await
    }

    /// One listen cycle followed by processing, for the HTTP surface.
    /// Shares the busy gate with the window: `Busy` while anything is in flight.
    pub async fn listen_once(&self) -> Result<(String, CommandReply), RecognitionError> {
        if !self.try_begin() {
            return Err(RecognitionError::Busy);
        }
        // Released on every path, including a dropped request
        let _slot = SlotGuard(&self.listening);

        let command = self.listener.listen().await?;
        let reply = self.process(&command).await;
        Ok((command, reply))
    }

    /// Speak in the background. Returns `false` while already speaking.
    pub fn speak(&self, text: &str, tx: UnboundedSender<UiEvent>) -> bool {
        if self
            .speaking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Speak rejected, already speaking");
            return false;
        }

        self.stop_requested.store(false, Ordering::SeqCst);
        post(&tx, UiEvent::SpeakingChanged(true));
        post(&tx, UiEvent::Status(Status::Speaking));

        let speaker = self.speaker.clone();
        let speaking = self.speaking.clone();
        let stop_requested = self.stop_requested.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            if stop_requested.swap(false, Ordering::SeqCst) {
                debug!("Speech stopped before it started");
            } else if let Err(e) = speaker.speak(&text).await {
                warn!("TTS error: {}", e);
            }
            speaking.store(false, Ordering::SeqCst);
            post(&tx, UiEvent::SpeakingChanged(false));
            post(&tx, UiEvent::Status(Status::Online));
        });

        true
    }

    /// Interrupt speech, including speech that has not reached the speaker yet
    pub fn stop_speaking(&self) {
        if self.is_speaking() {
            self.stop_requested.store(true, Ordering::SeqCst);
        }
        self.speaker.stop();
    }

    /// Post and speak the startup greeting
    pub fn greet(&self, tx: UnboundedSender<UiEvent>) {
        let runtime = self.clone();
        tokio::spawn(async move {
            let greeting = runtime.brain.lock().await.greeting().await;
            post(&tx, UiEvent::message(Author::Jarvis, greeting.clone()));
            runtime.speak(&greeting, tx);
        });
    }

    /// Clear the conversation and restart the provider session
    pub fn reset(&self, tx: UnboundedSender<UiEvent>) {
        let brain = self.brain.clone();
        tokio::spawn(async move {
            match brain.lock().await.reset().await {
                Ok(()) => post(&tx, UiEvent::message(Author::System, "Conversation reset.")),
                Err(e) => {
                    post(&tx, UiEvent::Status(Status::Error));
                    post(&tx, UiEvent::message(Author::System, format!("Error: {e}")));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::sync::Notify;

    use super::*;
    use crate::commands::{default_table, ActionError, ActionRunner, Dispatcher};
    use crate::config::AiConfig;
    use crate::conversation::testing::ScriptedProvider;
    use crate::conversation::ConversationClient;
    use crate::voice::{DisabledListener, MutedSpeaker, SynthesisError};

    struct NoopActions;

    impl ActionRunner for NoopActions {
        fn launch(&self, _program: &str, _args: &[String]) -> Result<(), ActionError> {
            Ok(())
        }

        fn open_url(&self, _url: &str) -> Result<(), ActionError> {
            Ok(())
        }
    }

    /// Returns queued results, optionally waiting for a release first
    #[derive(Default)]
    struct QueuedListener {
        results: StdMutex<VecDeque<Result<String, RecognitionError>>>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Listener for QueuedListener {
        async fn listen(&self) -> Result<String, RecognitionError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(RecognitionError::NoSpeech))
        }
    }

    /// Blocks until stopped
    #[derive(Default)]
    struct HoldingSpeaker {
        stop: Notify,
    }

    #[async_trait]
    impl Speaker for HoldingSpeaker {
        async fn speak(&self, _text: &str) -> Result<(), SynthesisError> {
            self.stop.notified().await;
            Ok(())
        }

        fn stop(&self) {
            self.stop.notify_one();
        }
    }

    fn runtime(
        provider: Arc<ScriptedProvider>,
        listener: Arc<dyn Listener>,
        speaker: Arc<dyn Speaker>,
    ) -> Runtime {
        let brain = Brain::new(
            Dispatcher::new(default_table(), Arc::new(NoopActions)),
            ConversationClient::new(provider, &AiConfig::default()),
        );
        Runtime::new(brain, listener, speaker)
    }

    fn listener_with(results: Vec<Result<String, RecognitionError>>) -> Arc<QueuedListener> {
        Arc::new(QueuedListener {
            results: StdMutex::new(results.into()),
            gate: None,
        })
    }

    /// Collect events until `done` matches one, or fail after a timeout
    async fn collect_until(
        rx: &mut UnboundedReceiver<UiEvent>,
        done: impl Fn(&UiEvent) -> bool,
    ) -> Vec<UiEvent> {
        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for UI events")
                .expect("channel closed");
            let finished = done(&event);
            events.push(event);
            if finished {
                return events;
            }
        }
    }

    fn messages(events: &[UiEvent]) -> Vec<(Author, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                UiEvent::Message { speaker, text } => Some((*speaker, text.clone())),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_voice_command_round_trip() {
        let provider = Arc::new(ScriptedProvider::replying(&["Opening YouTube, sir."]));
        let rt = runtime(
            provider.clone(),
            listener_with(vec![Ok("open youtube".to_string())]),
            Arc::new(MutedSpeaker),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(rt.start_listening(tx));
        let events = collect_until(&mut rx, |e| *e == UiEvent::SpeakingChanged(false)).await;

        assert_eq!(events[0], UiEvent::ListeningChanged(true));
        assert!(events.contains(&UiEvent::Status(Status::Processing)));
        assert!(events.contains(&UiEvent::Status(Status::Speaking)));
        assert_eq!(
            messages(&events),
            vec![
                (Author::You, "open youtube".to_string()),
                (Author::Jarvis, "Opening YouTube, sir.".to_string()),
            ]
        );
        assert_eq!(rt.brain().lock().await.conversation().history().len(), 2);
    }

    #[tokio::test]
    async fn test_second_listen_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let listener = Arc::new(QueuedListener {
            results: StdMutex::new(VecDeque::from([Err(RecognitionError::NoSpeech)])),
            gate: Some(gate.clone()),
        });
        let rt = runtime(
            Arc::new(ScriptedProvider::default()),
            listener,
            Arc::new(MutedSpeaker),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(rt.start_listening(tx.clone()));
        assert!(!rt.start_listening(tx.clone()));
        assert!(!rt.submit_text("hello", tx.clone()));

        gate.notify_one();
        let events = collect_until(&mut rx, |e| *e == UiEvent::ListeningChanged(false)).await;

        assert!(events.contains(&UiEvent::Status(Status::NoSpeech)));
        assert_eq!(
            messages(&events),
            vec![(
                Author::System,
                "No speech detected. Please try again.".to_string()
            )]
        );
        assert!(!rt.is_listening());
    }

    /// Counts utterances that reached the synthesizer
    #[derive(Default)]
    struct CountingSpeaker {
        spoken: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Speaker for CountingSpeaker {
        async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn stop(&self) {}
    }

    #[tokio::test]
    async fn test_stop_before_speech_starts() {
        let speaker = Arc::new(CountingSpeaker::default());
        let rt = runtime(
            Arc::new(ScriptedProvider::default()),
            Arc::new(DisabledListener),
            speaker.clone(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        // The speech task has not run yet on this single-threaded runtime
        assert!(rt.speak("Good day, sir.", tx.clone()));
        rt.stop_speaking();
        collect_until(&mut rx, |e| *e == UiEvent::SpeakingChanged(false)).await;

        assert!(speaker.spoken.lock().unwrap().is_empty());
        assert!(!rt.is_speaking());

        // A stale stop does not swallow the next utterance
        assert!(rt.speak("Welcome back.", tx));
        collect_until(&mut rx, |e| *e == UiEvent::SpeakingChanged(false)).await;
        assert_eq!(*speaker.spoken.lock().unwrap(), vec!["Welcome back.".to_string()]);
    }

    #[tokio::test]
    async fn test_listen_once_shares_busy_gate() {
        let gate = Arc::new(Notify::new());
        let listener = Arc::new(QueuedListener {
            results: StdMutex::new(VecDeque::from([Ok("what is your name".to_string())])),
            gate: Some(gate.clone()),
        });
        let rt = runtime(
            Arc::new(ScriptedProvider::replying(&["I am JARVIS, sir."])),
            listener,
            Arc::new(MutedSpeaker),
        );

        let first = tokio::spawn({
            let rt = rt.clone();
            async move { rt.listen_once().await }
        });
        while !rt.is_listening() {
            tokio::task::yield_now().await;
        }

        assert_eq!(rt.listen_once().await.unwrap_err(), RecognitionError::Busy);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(!rt.start_listening(tx));

        gate.notify_one();
        let (command, reply) = first.await.unwrap().unwrap();
        assert_eq!(command, "what is your name");
        assert_eq!(reply.text, "I am JARVIS, sir.");
        assert!(!rt.is_listening());

        // A failed capture releases the slot too
        gate.notify_one();
        assert_eq!(rt.listen_once().await.unwrap_err(), RecognitionError::NoSpeech);
        assert!(!rt.is_listening());
    }

    #[tokio::test]
    async fn test_unintelligible_reported() {
        let rt = runtime(
            Arc::new(ScriptedProvider::default()),
            listener_with(vec![Err(RecognitionError::Unintelligible)]),
            Arc::new(MutedSpeaker),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(rt.start_listening(tx));
        let events = collect_until(&mut rx, |e| *e == UiEvent::Status(Status::Online)).await;
        assert!(events.contains(&UiEvent::Status(Status::NotUnderstood)));
    }

    #[tokio::test]
    async fn test_listen_rejected_while_speaking() {
        let speaker = Arc::new(HoldingSpeaker::default());
        let rt = runtime(
            Arc::new(ScriptedProvider::default()),
            listener_with(vec![]),
            speaker.clone(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(rt.speak("Good day, sir.", tx.clone()));
        assert!(!rt.speak("again", tx.clone()));
        assert!(!rt.start_listening(tx.clone()));

        rt.stop_speaking();
        collect_until(&mut rx, |e| *e == UiEvent::SpeakingChanged(false)).await;
        assert!(!rt.is_speaking());
        assert!(rt.start_listening(tx));
    }

    #[tokio::test]
    async fn test_typed_input() {
        let provider = Arc::new(ScriptedProvider::replying(&["Forty-two, sir."]));
        let rt = runtime(provider, listener_with(vec![]), Arc::new(MutedSpeaker));
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(!rt.submit_text("   ", tx.clone()));
        assert!(rt.submit_text("meaning of life?", tx));

        let events = collect_until(&mut rx, |e| *e == UiEvent::SpeakingChanged(false)).await;
        assert!(!events.contains(&UiEvent::ListeningChanged(true)));
        assert_eq!(messages(&events)[1].1, "Forty-two, sir.");
    }

    #[tokio::test]
    async fn test_greet_and_reset() {
        let provider = Arc::new(ScriptedProvider::replying(&["Welcome back, sir."]));
        let rt = runtime(provider.clone(), listener_with(vec![]), Arc::new(MutedSpeaker));
        let (tx, mut rx) = mpsc::unbounded_channel();

        rt.greet(tx.clone());
        let events = collect_until(&mut rx, |e| *e == UiEvent::SpeakingChanged(false)).await;
        assert_eq!(
            messages(&events),
            vec![(Author::Jarvis, "Welcome back, sir.".to_string())]
        );

        rt.reset(tx);
        let events = collect_until(&mut rx, |e| matches!(e, UiEvent::Message { .. })).await;
        assert_eq!(
            messages(&events),
            vec![(Author::System, "Conversation reset.".to_string())]
        );
        assert!(rt.brain().lock().await.conversation().history().is_empty());
    }
}
