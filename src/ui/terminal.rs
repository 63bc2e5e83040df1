//! Terminal setup and teardown
//!
//! A panic hook restores the terminal before the panic message prints;
//! without it a crash leaves the shell in raw mode.

use std::io::{self, stdout, Write};
use std::panic;

use color_eyre::Result;
use crossterm::{
    cursor, execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

pub type Tui = Terminal<CrosstermBackend<io::Stdout>>;

fn leave() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen, cursor::Show)
}

fn install_panic_hook() {
    let eyre_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = leave();
        eyre_hook(panic_info);
    }));
}

/// Raw mode, alternate screen, hidden cursor and the window title
pub fn init(title: &str) -> Result<Tui> {
    // Already installed is fine; ours must wrap eyre's hook
    let _ = color_eyre::install();
    install_panic_hook();

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen, cursor::Hide)?;
    set_title(title);

    Ok(Terminal::new(CrosstermBackend::new(stdout()))?)
}

pub fn restore() -> Result<()> {
    set_title("");
    leave()?;
    Ok(())
}

/// OSC 0 window title
fn set_title(title: &str) {
    let mut out = stdout();
    let _ = write!(out, "\x1b]0;{title}\x1b\\");
    let _ = out.flush();
}
