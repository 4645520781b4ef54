//! CLI for esptop, a btop-style dashboard for an ESP32 on a serial port.

mod commands;
mod logging;
mod serial;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "esptop")]
#[command(about = "esptop: live ESP32 telemetry dashboard over a serial link")]
#[command(version = esptop_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live interactive dashboard (TUI). Keys: s pause/resume, a all tasks, q quit
    Monitor {
        /// Serial device the ESP32 is attached to
        #[arg(long, default_value = "/dev/ttyUSB0")]
        port: String,

        /// Bit rate of the serial link
        #[arg(long, default_value = "115200")]
        baud: u32,

        /// Minimum time between screen refreshes, in milliseconds
        #[arg(long, default_value = "50")]
        refresh_ms: u64,

        /// How long a single read waits for data, in milliseconds (rounded up to 100ms steps)
        #[arg(long, default_value = "100")]
        read_timeout_ms: u64,

        /// Delay between reconnect attempts after the link drops, in milliseconds
        #[arg(long, default_value = "2000")]
        reconnect_ms: u64,

        /// Append diagnostic logs to this file (RUST_LOG overrides the level)
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Validate a captured telemetry log, one JSON record per line
    Check {
        /// Path to the captured log
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            port,
            baud,
            refresh_ms,
            read_timeout_ms,
            reconnect_ms,
            log_file,
        } => {
            if let Err(e) = logging::init(log_file.as_deref()) {
                eprintln!("Error: cannot open log file: {e}");
                std::process::exit(1);
            }
            commands::monitor::run(commands::monitor::MonitorConfig {
                port: &port,
                baud,
                refresh_ms,
                read_timeout_ms,
                reconnect_ms,
            })
        }
        Commands::Check { file, json } => commands::check::run(&file, json),
    }
}
