//! The ratatui renderer.
//!
//! [`TerminalRenderer`] owns the alternate screen for its lifetime. Leaving
//! it happens in `Drop` and, on panic, in a hook installed on entry, so the
//! user's shell is restored on every exit path.

use std::io::{self, Stdout};

use crossterm::{
    cursor, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode},
};
use esptop_core::{DashboardView, Renderer};
use ratatui::{Terminal, backend::CrosstermBackend};

pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalRenderer {
    /// Switch to the alternate screen and hide the cursor.
    pub fn enter() -> io::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        install_panic_hook();

        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
                Err(e)
            }
        }
    }
}

impl Renderer for TerminalRenderer {
    fn submit(&mut self, view: &DashboardView) -> io::Result<()> {
        self.terminal.draw(|f| super::ui::draw(f, view))?;
        Ok(())
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            cursor::Show
        );
    }
}

/// Restore the terminal before the default hook prints the panic.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
        original_hook(info);
    }));
}
