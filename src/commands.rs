//! Keyword command table and dispatcher.
//!
//! An utterance is matched against an ordered table of triggers. The first
//! entry whose trigger fits fires its action and the search stops. Actions
//! either launch a local program, open a URL in the default browser, or
//! answer locally (time and date).

use std::process::{Command, Stdio};
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Verbs that turn a bare keyword into an "open this" request
pub const OPEN_QUALIFIERS: [&str; 2] = ["open", "launch"];

/// What a matched entry does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandAction {
    /// Spawn a local executable
    Launch {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Open a URL in the default browser
    OpenUrl { url: String },
    /// Answer with the local time
    TellTime,
    /// Answer with today's date
    TellDate,
}

/// One row of the pattern table.
///
/// At least one keyword must appear in the input as whole words. When
/// qualifiers are listed, at least one of them must appear too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub qualifiers: Vec<String>,
    pub action: CommandAction,
}

impl CommandEntry {
    /// Keyword plus one of the "open" verbs
    pub fn open(name: &str, keyword: &str, action: CommandAction) -> Self {
        Self {
            name: name.to_string(),
            keywords: vec![keyword.to_string()],
            qualifiers: OPEN_QUALIFIERS.iter().map(ToString::to_string).collect(),
            action,
        }
    }

    /// Any of the given phrases, no qualifier needed
    pub fn phrases(name: &str, phrases: &[&str], action: CommandAction) -> Self {
        Self {
            name: name.to_string(),
            keywords: phrases.iter().map(ToString::to_string).collect(),
            qualifiers: Vec::new(),
            action,
        }
    }

    /// Input must already be normalized
    pub fn matches(&self, input: &str) -> bool {
        let words = words(input);
        let has_keyword = self.keywords.iter().any(|k| contains_phrase(&words, k));
        let has_qualifier = self.qualifiers.is_empty()
            || self.qualifiers.iter().any(|q| contains_phrase(&words, q));

        has_keyword && has_qualifier
    }
}

/// Ordered pattern table; first match wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTable {
    pub commands: Vec<CommandEntry>,
}

impl Default for CommandTable {
    fn default() -> Self {
        default_table()
    }
}

impl CommandTable {
    pub fn new(commands: Vec<CommandEntry>) -> Self {
        Self { commands }
    }

    /// First entry whose trigger fits the normalized input
    pub fn find(&self, input: &str) -> Option<&CommandEntry> {
        self.commands.iter().find(|entry| entry.matches(input))
    }

    /// One line per entry, for `jarvis commands` and the persona prompt
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for entry in &self.commands {
            let target = match &entry.action {
                CommandAction::Launch { program, args } if args.is_empty() => program.clone(),
                CommandAction::Launch { program, args } => format!("{program} {}", args.join(" ")),
                CommandAction::OpenUrl { url } => url.clone(),
                CommandAction::TellTime => "local time".to_string(),
                CommandAction::TellDate => "local date".to_string(),
            };
            out.push_str(&format!(
                "- {}: [{}] -> {}\n",
                entry.name,
                entry.keywords.join(", "),
                target
            ));
        }
        out
    }
}

/// Lowercase and trim, as every trigger expects
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Alphanumeric runs; apostrophes stay inside a word ("today's")
fn words(input: &str) -> Vec<&str> {
    input
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect()
}

/// `phrase` occurs as consecutive whole words, so "open" never fits "reopen"
fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let needle = self::words(phrase);
    !needle.is_empty() && words.windows(needle.len()).any(|w| w == needle.as_slice())
}

fn launch(program: &str, args: &[&str]) -> CommandAction {
    CommandAction::Launch {
        program: program.to_string(),
        args: args.iter().map(ToString::to_string).collect(),
    }
}

fn open_url(url: &str) -> CommandAction {
    CommandAction::OpenUrl {
        url: url.to_string(),
    }
}

fn browser_launch() -> CommandAction {
    if cfg!(target_os = "windows") {
        launch("cmd", &["/C", "start", "chrome"])
    } else if cfg!(target_os = "macos") {
        launch("open", &["-a", "Google Chrome"])
    } else {
        launch("google-chrome", &[])
    }
}

fn editor_launch() -> CommandAction {
    if cfg!(target_os = "windows") {
        launch("notepad.exe", &[])
    } else if cfg!(target_os = "macos") {
        launch("open", &["-a", "TextEdit"])
    } else {
        launch("gedit", &[])
    }
}

/// Built-in table used when the config does not override it
pub fn default_table() -> CommandTable {
    CommandTable::new(vec![
        CommandEntry::open("chrome", "chrome", browser_launch()),
        CommandEntry::open("notepad", "notepad", editor_launch()),
        CommandEntry::open("youtube", "youtube", open_url("https://www.youtube.com")),
        CommandEntry::open("github", "github", open_url("https://github.com")),
        CommandEntry::open("leetcode", "leetcode", open_url("https://leetcode.com")),
        CommandEntry::phrases(
            "time",
            &["what time", "what's the time", "current time", "time is it"],
            CommandAction::TellTime,
        ),
        CommandEntry::phrases(
            "date",
            &["what date", "today's date", "what day", "the date today", "tell me the date"],
            CommandAction::TellDate,
        ),
    ])
}

/// Error from an external action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open '{url}': {source}")]
    OpenUrl {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// OS-level side effects behind the dispatcher
pub trait ActionRunner: Send + Sync {
    fn launch(&self, program: &str, args: &[String]) -> Result<(), ActionError>;
    fn open_url(&self, url: &str) -> Result<(), ActionError>;
}

/// Spawns real processes and opens the real browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemActions;

impl ActionRunner for SystemActions {
    fn launch(&self, program: &str, args: &[String]) -> Result<(), ActionError> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|child| debug!("Launched {} (pid {})", program, child.id()))
            .map_err(|source| ActionError::Launch {
                program: program.to_string(),
                source,
            })
    }

    fn open_url(&self, url: &str) -> Result<(), ActionError> {
        open::that_detached(url).map_err(|source| ActionError::OpenUrl {
            url: url.to_string(),
            source,
        })
    }
}

/// A matched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub name: String,
    pub action: CommandAction,
    /// Text answered without the chat provider (time, date)
    pub local_reply: Option<String>,
}

/// Matches utterances against the table and fires at most one action
pub struct Dispatcher {
    table: CommandTable,
    runner: Arc<dyn ActionRunner>,
}

impl Dispatcher {
    pub fn new(table: CommandTable, runner: Arc<dyn ActionRunner>) -> Self {
        Self { table, runner }
    }

    /// Default table wired to the real OS
    pub fn system() -> Self {
        Self::new(CommandTable::default(), Arc::new(SystemActions))
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// `true` when an entry matched, whether or not its side effect succeeded
    pub fn dispatch(&self, text: &str) -> bool {
        self.dispatch_command(text).is_some()
    }

    /// Match and fire. A failing side effect is logged; the command still
    /// counts as recognized.
    pub fn dispatch_command(&self, text: &str) -> Option<Dispatched> {
        let input = normalize(text);
        let entry = self.table.find(&input)?;
        info!("Command '{}' matched", entry.name);

        let result = match &entry.action {
            CommandAction::Launch { program, args } => self.runner.launch(program, args),
            CommandAction::OpenUrl { url } => self.runner.open_url(url),
            CommandAction::TellTime | CommandAction::TellDate => Ok(()),
        };

        if let Err(e) = result {
            error!("Command execution error for '{}': {}", entry.name, e);
        }

        let local_reply = match entry.action {
            CommandAction::TellTime => Some(format!(
                "The current time is {}",
                Local::now().format("%I:%M %p")
            )),
            CommandAction::TellDate => Some(format!(
                "Today's date is {}",
                Local::now().format("%B %d, %Y")
            )),
            _ => None,
        };

        Some(Dispatched {
            name: entry.name.clone(),
            action: entry.action.clone(),
            local_reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingActions {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingActions {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ActionRunner for RecordingActions {
        fn launch(&self, program: &str, _args: &[String]) -> Result<(), ActionError> {
            self.calls.lock().unwrap().push(format!("launch:{program}"));
            if self.fail {
                return Err(ActionError::Launch {
                    program: program.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            Ok(())
        }

        fn open_url(&self, url: &str) -> Result<(), ActionError> {
            self.calls.lock().unwrap().push(format!("url:{url}"));
            if self.fail {
                return Err(ActionError::OpenUrl {
                    url: url.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "no browser"),
                });
            }
            Ok(())
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<RecordingActions>) {
        let runner = Arc::new(RecordingActions::default());
        (Dispatcher::new(default_table(), runner.clone()), runner)
    }

    #[rstest]
    #[case("open chrome please", Some("chrome"))]
    #[case("launch chrome", Some("chrome"))]
    #[case("OPEN Chrome", Some("chrome"))]
    #[case("  open notepad  ", Some("notepad"))]
    #[case("open youtube", Some("youtube"))]
    #[case("could you open my github", Some("github"))]
    #[case("launch leetcode", Some("leetcode"))]
    #[case("open chrome, please!", Some("chrome"))]
    #[case("what time is it", Some("time"))]
    #[case("tell me the date", Some("date"))]
    #[case("tell me about chrome history", None)]
    #[case("youtube is great", None)]
    #[case("hello there", None)]
    #[case("when did youtube start", None)]
    #[case("any github startup ideas?", None)]
    #[case("restart my thinking about leetcode", None)]
    #[case("reopen the question of chrome", None)]
    #[case("tell me about the time machine", None)]
    #[case("what's the date of the moon landing", None)]
    #[case("what's the current time", Some("time"))]
    #[case("", None)]
    fn test_matching(#[case] input: &str, #[case] expected: Option<&str>) {
        let (dispatcher, _) = dispatcher();
        let matched = dispatcher.dispatch_command(input).map(|d| d.name);
        assert_eq!(matched.as_deref(), expected);
    }

    #[test]
    fn test_first_match_fires_once() {
        let (dispatcher, runner) = dispatcher();
        assert!(dispatcher.dispatch("open chrome please"));
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("launch:"));
    }

    #[test]
    fn test_first_entry_wins_on_overlap() {
        // Both chrome and youtube fit; chrome is declared first
        let (dispatcher, runner) = dispatcher();
        let d = dispatcher.dispatch_command("open chrome and youtube").unwrap();
        assert_eq!(d.name, "chrome");
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_no_match_has_no_side_effect() {
        let (dispatcher, runner) = dispatcher();
        assert!(!dispatcher.dispatch("tell me about chrome history"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_url_action() {
        let (dispatcher, runner) = dispatcher();
        assert!(dispatcher.dispatch("open youtube"));
        assert_eq!(runner.calls(), vec!["url:https://www.youtube.com".to_string()]);
    }

    #[test]
    fn test_failed_action_still_matches() {
        let runner = Arc::new(RecordingActions::failing());
        let dispatcher = Dispatcher::new(default_table(), runner.clone());
        assert!(dispatcher.dispatch("open youtube"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_time_answers_locally() {
        let (dispatcher, runner) = dispatcher();
        let d = dispatcher.dispatch_command("what's the time").unwrap();
        assert_eq!(d.action, CommandAction::TellTime);
        assert!(d.local_reply.unwrap().starts_with("The current time is "));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_table_toml_shape() {
        let raw = r#"
[[commands]]
name = "docs"
keywords = ["docs", "documentation"]
qualifiers = ["open"]
action = { type = "open_url", url = "https://docs.rs" }

[[commands]]
name = "terminal"
keywords = ["terminal"]
qualifiers = ["open"]
action = { type = "launch", program = "alacritty" }
"#;
        let table: CommandTable = toml::from_str(raw).unwrap();
        assert_eq!(table.commands.len(), 2);
        assert!(table.find("open the documentation").is_some());
        assert_eq!(
            table.commands[1].action,
            CommandAction::Launch {
                program: "alacritty".to_string(),
                args: vec![]
            }
        );
    }

    #[test]
    fn test_describe_lists_every_entry() {
        let table = default_table();
        let text = table.describe();
        assert_eq!(text.lines().count(), table.commands.len());
        assert!(text.contains("youtube"));
    }
}
