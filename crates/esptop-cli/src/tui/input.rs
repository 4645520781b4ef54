//! Keystroke listener.
//!
//! Runs on its own thread with the terminal in raw mode so single keys arrive
//! without Enter. It never blocks for longer than [`POLL_INTERVAL`], so it
//! notices a quit requested elsewhere (Ctrl-C handler, dashboard loop) and
//! exits, dropping raw mode on the way out.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use esptop_core::{Command, SharedFlags};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw mode for as long as the guard lives; the prior mode comes back on drop.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

pub struct InputListener {
    handle: JoinHandle<()>,
}

impl InputListener {
    /// Enter raw mode and start listening.
    ///
    /// Fails when stdin is not a terminal; the dashboard then runs without
    /// keyboard control.
    pub fn spawn(flags: Arc<SharedFlags>) -> io::Result<Self> {
        let guard = RawModeGuard::acquire()?;
        let handle = thread::Builder::new()
            .name("esptop-input".into())
            .spawn(move || {
                let _guard = guard;
                listen(&flags);
            })?;
        Ok(Self { handle })
    }

    /// Wait for the listener to notice quit and restore the terminal mode.
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("input listener panicked");
        }
    }
}

fn listen(flags: &SharedFlags) {
    while !flags.quit_requested() {
        match next_key() {
            Ok(Some(key)) => {
                if let Some(cmd) = command_for(key) {
                    let on = flags.apply(cmd);
                    log::info!("key {:?}: {} ({})", key.code, cmd.label(), on);
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("keyboard input failed: {e}; quitting");
                flags.request_quit();
            }
        }
    }
}

fn next_key() -> io::Result<Option<KeyEvent>> {
    if event::poll(POLL_INTERVAL)?
        && let Event::Key(key) = event::read()?
        && key.kind == KeyEventKind::Press
    {
        return Ok(Some(key));
    }
    Ok(None)
}

/// Map a key press to a dashboard command. Esc and Ctrl-C also quit.
pub fn command_for(key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char(c) => Command::from_char(c),
        KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn letters_map_case_insensitively() {
        assert_eq!(command_for(key(KeyCode::Char('s'))), Some(Command::TogglePause));
        assert_eq!(command_for(key(KeyCode::Char('A'))), Some(Command::ToggleAllTasks));
        assert_eq!(command_for(key(KeyCode::Char('q'))), Some(Command::Quit));
    }

    #[test]
    fn escape_and_ctrl_c_quit() {
        assert_eq!(command_for(key(KeyCode::Esc)), Some(Command::Quit));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(command_for(ctrl_c), Some(Command::Quit));
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(command_for(key(KeyCode::Char('c'))), None);
        assert_eq!(command_for(key(KeyCode::Enter)), None);
        assert_eq!(command_for(key(KeyCode::Char('x'))), None);
    }
}
