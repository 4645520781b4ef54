//! Keyboard commands and the flags they flip.
//!
//! The keystroke listener and the dashboard loop run on different threads and
//! share nothing but [`SharedFlags`]. Each flag is an independent boolean, so
//! relaxed-visibility atomics are enough.

use std::sync::atomic::{AtomicBool, Ordering};

/// A recognized single-key command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    ToggleAllTasks,
    Quit,
}

impl Command {
    /// Map a typed character to a command, ignoring case. Unknown keys map to `None`.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            's' => Some(Self::TogglePause),
            'a' => Some(Self::ToggleAllTasks),
            'q' => Some(Self::Quit),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TogglePause => "pause/resume",
            Self::ToggleAllTasks => "all tasks",
            Self::Quit => "quit",
        }
    }
}

/// Flags written by the input listener and read by the dashboard loop.
#[derive(Debug, Default)]
pub struct SharedFlags {
    paused: AtomicBool,
    show_all_tasks: AtomicBool,
    quit: AtomicBool,
}

impl SharedFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a command. Toggles return the new value of the flag they flipped.
    pub fn apply(&self, command: Command) -> bool {
        match command {
            Command::TogglePause => toggle(&self.paused),
            Command::ToggleAllTasks => toggle(&self.show_all_tasks),
            Command::Quit => {
                self.request_quit();
                true
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn show_all_tasks(&self) -> bool {
        self.show_all_tasks.load(Ordering::Relaxed)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }
}

fn toggle(flag: &AtomicBool) -> bool {
    !flag.fetch_xor(true, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn keys_are_case_insensitive() {
        assert_eq!(Command::from_char('s'), Some(Command::TogglePause));
        assert_eq!(Command::from_char('S'), Some(Command::TogglePause));
        assert_eq!(Command::from_char('A'), Some(Command::ToggleAllTasks));
        assert_eq!(Command::from_char('q'), Some(Command::Quit));
        assert_eq!(Command::from_char('Q'), Some(Command::Quit));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        for c in ['x', ' ', '1', 'c', 'm', 'w', '\n'] {
            assert_eq!(Command::from_char(c), None, "{c:?}");
        }
    }

    #[test]
    fn toggles_flip_and_report_new_value() {
        let flags = SharedFlags::new();
        assert!(!flags.is_paused());
        assert!(flags.apply(Command::TogglePause));
        assert!(flags.is_paused());
        assert!(!flags.apply(Command::TogglePause));
        assert!(!flags.is_paused());

        assert!(flags.apply(Command::ToggleAllTasks));
        assert!(flags.show_all_tasks());
    }

    #[test]
    fn quit_is_sticky() {
        let flags = SharedFlags::new();
        flags.apply(Command::Quit);
        flags.apply(Command::Quit);
        assert!(flags.quit_requested());
    }

    #[test]
    fn writes_from_another_thread_are_visible() {
        let flags = Arc::new(SharedFlags::new());
        let writer = Arc::clone(&flags);
        thread::spawn(move || {
            writer.apply(Command::ToggleAllTasks);
            writer.apply(Command::Quit);
        })
        .join()
        .unwrap();
        assert!(flags.show_all_tasks());
        assert!(flags.quit_requested());
        assert!(!flags.is_paused());
    }
}
