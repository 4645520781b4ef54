use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use esptop_core::{ControllerConfig, DashboardController, LinkInfo, SharedFlags};

use crate::serial::{SUPPORTED_BAUDS, SerialLink};
use crate::tui::input::InputListener;
use crate::tui::terminal::TerminalRenderer;

pub struct MonitorConfig<'a> {
    pub port: &'a str,
    pub baud: u32,
    pub refresh_ms: u64,
    pub read_timeout_ms: u64,
    pub reconnect_ms: u64,
}

pub fn run(cfg: MonitorConfig<'_>) {
    if !SUPPORTED_BAUDS.contains(&cfg.baud) {
        eprintln!(
            "Error: unsupported baud rate {} (supported: {})",
            cfg.baud,
            SUPPORTED_BAUDS
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        std::process::exit(1);
    }

    let flags = Arc::new(SharedFlags::new());
    if let Err(e) = install_quit_on_signal(Arc::clone(&flags)) {
        log::warn!("cannot install signal handler: {e}");
    }

    let renderer = match TerminalRenderer::enter() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: cannot set up terminal: {e}");
            std::process::exit(1);
        }
    };

    let port = Path::new(cfg.port);
    let read_timeout = Duration::from_millis(cfg.read_timeout_ms);
    let config = ControllerConfig {
        tick: Duration::from_millis(cfg.refresh_ms),
        reconnect_interval: Duration::from_millis(cfg.reconnect_ms),
        ..ControllerConfig::default()
    };
    let link = LinkInfo {
        port: cfg.port.to_string(),
        baud: cfg.baud,
    };

    // On failure the renderer is dropped inside connect, leaving the
    // alternate screen before the message below is printed.
    let mut dashboard = match DashboardController::connect(
        || SerialLink::open(port, cfg.baud, read_timeout),
        renderer,
        Arc::clone(&flags),
        link,
        config,
    ) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Make sure the ESP32 is connected to {}", cfg.port);
            std::process::exit(1);
        }
    };

    let input = match InputListener::spawn(Arc::clone(&flags)) {
        Ok(listener) => Some(listener),
        Err(e) => {
            log::warn!("keyboard control unavailable: {e}");
            None
        }
    };

    let result = dashboard.run();

    flags.request_quit();
    if let Some(listener) = input {
        listener.join();
    }
    drop(dashboard);

    match result {
        Ok(()) => println!("ESP32 Monitor closed."),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Turn SIGINT, SIGTERM and SIGHUP into a quit request so the loop unwinds
/// and the terminal is restored.
fn install_quit_on_signal(flags: Arc<SharedFlags>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        log::info!("termination signal received");
        flags.request_quit();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    // The only test in this binary that installs the process-wide handler.
    #[cfg(unix)]
    #[test]
    fn sigterm_requests_quit() {
        let flags = Arc::new(SharedFlags::new());
        install_quit_on_signal(Arc::clone(&flags)).unwrap();

        // SAFETY: raising a signal we just installed a handler for.
        assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !flags.quit_requested() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(flags.quit_requested());
    }
}
