//! Terminal UI
//!
//! ## Architecture
//!
//! - `app.rs` - state, event handling and the tick loop
//! - `terminal.rs` - terminal setup/teardown
//! - `render.rs` - layout and rendering

pub mod app;
pub mod render;
pub mod terminal;

pub use app::{App, LogLine};

use color_eyre::Result;

/// Run the window until closed. The terminal is restored even when the loop
/// fails.
pub fn run(mut app: App) -> Result<()> {
    let mut terminal = terminal::init("JARVIS")?;
    let result = app.run(&mut terminal);
    terminal::restore()?;
    result
}
