//! # esptop-core
//!
//! **A btop-style view of an ESP32, one JSON line at a time.**
//!
//! `esptop-core` holds everything the dashboard does that is not terminal
//! I/O: decoding telemetry records, estimating link throughput, keeping
//! bounded history, quantizing sparklines, assembling panel models, and the
//! loop that ties a telemetry link to a renderer.
//!
//! ## Architecture
//!
//! Link ([`LineSource`]) → [`parse_record`] → [`DashboardController`]
//! (state, [`RateEstimator`], [`Histories`]) → [`build_view`] → [`Renderer`]
//!
//! A keystroke listener on its own thread talks to the controller only
//! through [`SharedFlags`].
//!
//! ```
//! use esptop_core::{parse_record, DEFAULT_TOTAL_HEAP};
//!
//! let rec = parse_record(br#"{"heap":100000,"rssi":-60}"#).unwrap();
//! assert_eq!(rec.total_heap, DEFAULT_TOTAL_HEAP);
//! assert_eq!(rec.used_heap(), DEFAULT_TOTAL_HEAP - 100_000);
//! ```

pub mod controller;
pub mod graph;
pub mod history;
pub mod input;
pub mod panels;
pub mod rate;
pub mod record;
pub mod state;
pub mod transport;

pub use controller::{
    Clock, ControllerConfig, ControllerError, DashboardController, Renderer, SystemClock,
};
pub use graph::{GLYPHS, Graph, render_graph};
pub use history::{Histories, HistoryBuffer};
pub use input::{Command, SharedFlags};
pub use panels::{
    Band, Bar, CpuPanel, DashboardView, FooterPanel, HeaderPanel, MemoryPanel, NetworkPanel,
    PanelView, TaskPanel, TaskRow, Throughput, build_view, format_bytes, format_task_mem,
    format_uptime,
};
pub use rate::RateEstimator;
pub use record::{
    DEFAULT_MAX_CPU_MHZ, DEFAULT_TOTAL_HEAP, ParseError, TaskRecord, TelemetryRecord, parse_record,
};
pub use state::{DashboardState, LinkInfo, Phase};
pub use transport::{LineReader, LineSource, TransportError};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
