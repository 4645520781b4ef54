//! Panel models.
//!
//! [`build_view`] is a pure function of the dashboard state, the history
//! series and the task filter flag. It decides *what* every panel shows:
//! numbers, formatted strings, bar fills, colour bands and quantized graphs.
//! How that is painted is up to the renderer.

use std::time::{Duration, Instant};

use crate::graph::{Graph, render_graph};
use crate::history::Histories;
use crate::record::{TaskRecord, TelemetryRecord};
use crate::state::{DashboardState, Phase};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Tasks hidden unless "all tasks" is on. Compared case-insensitively.
pub const HIDDEN_TASKS: [&str; 4] = ["IDLE0", "IDLE1", "IPC0", "IPC1"];

/// Most task rows a panel lists.
pub const MAX_TASK_ROWS: usize = 15;

/// Cells in a usage bar; one cell per 5 %.
pub const BAR_WIDTH: usize = 20;

/// Processor graph: width, height, fixed maximum (percent).
pub const CPU_GRAPH: GraphSpec = GraphSpec::new(40, 6, Some(100.0));
/// Memory graph: width, height, fixed maximum (percent).
pub const MEMORY_GRAPH: GraphSpec = GraphSpec::new(40, 3, Some(100.0));
/// Network graphs: width, height, fixed maximum (KB/s).
pub const NETWORK_GRAPH: GraphSpec = GraphSpec::new(35, 8, Some(50.0));

/// Memory usage below this percentage is [`Band::Normal`].
pub const WARN_PERCENT: f64 = 60.0;
/// Memory usage at or above this percentage is [`Band::Critical`].
pub const CRITICAL_PERCENT: f64 = 80.0;

pub const WAITING_DEVICE: &str = "Waiting for ESP32...";
pub const WAITING_DATA: &str = "No data yet";
pub const WAITING_TASKS: &str = "Waiting for task data from ESP32...";

/// Size and scale of a sparkline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSpec {
    pub width: usize,
    pub height: usize,
    pub max: Option<f64>,
}

impl GraphSpec {
    pub const fn new(width: usize, height: usize, max: Option<f64>) -> Self {
        Self { width, height, max }
    }

    fn render(self, samples: &[f64]) -> Graph {
        render_graph(samples, self.width, self.height, self.max)
    }
}

// ---------------------------------------------------------------------------
// View models
// ---------------------------------------------------------------------------

/// What a data panel shows.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelView<T> {
    /// No usable telemetry yet; show the message instead of data.
    Waiting(&'static str),
    /// Updates are paused.
    Paused,
    Ready(T),
}

impl<T> PanelView<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting(_))
    }
}

/// Colour band for a usage percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Normal,
    Warning,
    Critical,
}

impl Band {
    pub fn for_percent(percent: f64) -> Self {
        if percent < WARN_PERCENT {
            Self::Normal
        } else if percent < CRITICAL_PERCENT {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

/// A horizontal usage bar of `width` cells, `filled` of them set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub percent: f64,
    pub filled: usize,
    pub width: usize,
}

impl Bar {
    pub fn empty(&self) -> usize {
        self.width - self.filled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHint {
    pub key: &'static str,
    pub action: &'static str,
}

pub const KEY_HINTS: [KeyHint; 3] = [
    KeyHint {
        key: "A",
        action: "alltasks",
    },
    KeyHint {
        key: "S",
        action: "stop",
    },
    KeyHint {
        key: "Q",
        action: "quit",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPanel {
    pub title: &'static str,
    pub phase: Phase,
    pub show_all_tasks: bool,
    /// Time since the dashboard started.
    pub elapsed: String,
    pub keys: &'static [KeyHint],
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuPanel {
    pub mhz: f64,
    pub max_mhz: f64,
    pub total: Bar,
    pub cores: [Bar; 2],
    pub graph: Graph,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPanel {
    pub total: String,
    pub used: String,
    pub available: String,
    pub min_free: String,
    pub used_bar: Bar,
    /// Share of heap still free, percent.
    pub available_percent: f64,
    pub band: Band,
    pub graph: Graph,
}

/// Rate, peak and running total for one link direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// KB/s.
    pub current: f64,
    /// Highest rate seen, KB/s.
    pub top: f64,
    /// KiB moved so far.
    pub total_kb: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPanel {
    pub rssi: i64,
    pub download: Throughput,
    pub upload: Throughput,
    pub download_graph: Graph,
    pub upload_graph: Graph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub pid: u64,
    pub name: String,
    pub cmd: String,
    pub threads: u64,
    pub user: String,
    pub mem: String,
    pub cpu: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskPanel {
    pub rows: Vec<TaskRow>,
    /// Tasks passing the filter (may exceed `rows.len()`).
    pub matched: usize,
    /// Tasks in the record.
    pub total: usize,
    /// `task_count` as reported by the device.
    pub reported: u64,
    pub show_all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FooterPanel {
    pub port: String,
    pub baud: u32,
    /// Current download rate, KB/s.
    pub rate: f64,
    pub records: u64,
    pub parse_errors: u64,
    pub read_errors: u64,
    /// Times the link was re-established after dropping.
    pub reconnects: u64,
    /// Last record is older than the stale threshold.
    pub stale: bool,
}

/// A complete frame's worth of panel models.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub header: HeaderPanel,
    pub cpu: PanelView<CpuPanel>,
    pub memory: PanelView<MemoryPanel>,
    pub network: PanelView<NetworkPanel>,
    pub tasks: PanelView<TaskPanel>,
    pub footer: FooterPanel,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assemble every panel for the frame at `now`.
pub fn build_view(
    state: &DashboardState,
    histories: &Histories,
    show_all_tasks: bool,
    now: Instant,
) -> DashboardView {
    let paused = state.phase == Phase::Paused;
    let record = state.record.as_ref();

    DashboardView {
        header: HeaderPanel {
            title: "ESP32 Monitor",
            phase: state.phase,
            show_all_tasks,
            elapsed: format_elapsed(now.saturating_duration_since(state.started_at)),
            keys: &KEY_HINTS,
        },
        cpu: data_panel(paused, record, WAITING_DEVICE, |r| cpu_panel(r, histories)),
        memory: data_panel(paused, record, WAITING_DATA, |r| {
            memory_panel(r, histories)
        }),
        network: data_panel(paused, record, WAITING_DATA, |r| {
            network_panel(r, state, histories)
        }),
        tasks: task_panel(record, show_all_tasks),
        footer: FooterPanel {
            port: state.link.port.clone(),
            baud: state.link.baud,
            rate: state.rates.download_rate(),
            records: state.records_received,
            parse_errors: state.parse_errors,
            read_errors: state.read_errors,
            reconnects: state.reconnects,
            stale: state.is_stale(now),
        },
    }
}

fn data_panel<T>(
    paused: bool,
    record: Option<&TelemetryRecord>,
    waiting: &'static str,
    build: impl FnOnce(&TelemetryRecord) -> T,
) -> PanelView<T> {
    if paused {
        return PanelView::Paused;
    }
    match record {
        Some(r) => PanelView::Ready(build(r)),
        None => PanelView::Waiting(waiting),
    }
}

fn cpu_panel(record: &TelemetryRecord, histories: &Histories) -> CpuPanel {
    CpuPanel {
        mhz: record.cpu_mhz,
        max_mhz: record.max_cpu_mhz,
        total: usage_bar(record.cpu_percent(), BAR_WIDTH),
        cores: [
            usage_bar(record.cpu_core0, BAR_WIDTH),
            usage_bar(record.cpu_core1, BAR_WIDTH),
        ],
        graph: CPU_GRAPH.render(&histories.cpu.snapshot()),
        uptime: format_uptime(record.uptime_ms),
    }
}

fn memory_panel(record: &TelemetryRecord, histories: &Histories) -> MemoryPanel {
    let percent = record.heap_percent();
    MemoryPanel {
        total: format_bytes(record.total_heap),
        used: format_bytes(record.used_heap()),
        available: format_bytes(record.heap),
        min_free: format_bytes(record.min_heap),
        used_bar: usage_bar(percent, BAR_WIDTH),
        available_percent: (100.0 - percent).max(0.0),
        band: Band::for_percent(percent),
        graph: MEMORY_GRAPH.render(&histories.memory.snapshot()),
    }
}

fn network_panel(
    record: &TelemetryRecord,
    state: &DashboardState,
    histories: &Histories,
) -> NetworkPanel {
    let rates = &state.rates;
    NetworkPanel {
        rssi: record.rssi,
        download: Throughput {
            current: rates.download_rate(),
            top: rates.download_peak(),
            total_kb: rates.download_total_kb(),
        },
        upload: Throughput {
            current: rates.upload_rate(),
            top: rates.upload_peak(),
            total_kb: rates.upload_total_kb(),
        },
        download_graph: NETWORK_GRAPH.render(&histories.download.snapshot()),
        upload_graph: NETWORK_GRAPH.render(&histories.upload.snapshot()),
    }
}

fn task_panel(record: Option<&TelemetryRecord>, show_all: bool) -> PanelView<TaskPanel> {
    let Some(record) = record.filter(|r| !r.tasks.is_empty()) else {
        return PanelView::Waiting(WAITING_TASKS);
    };

    let visible: Vec<&TaskRecord> = record
        .tasks
        .iter()
        .filter(|t| show_all || !is_hidden_task(&t.name))
        .collect();

    PanelView::Ready(TaskPanel {
        rows: visible
            .iter()
            .take(MAX_TASK_ROWS)
            .map(|t| TaskRow {
                pid: t.pid,
                name: t.name.clone(),
                cmd: t.cmd.clone(),
                threads: t.threads,
                user: t.user.clone(),
                mem: format_task_mem(t.mem),
                cpu: t.cpu,
            })
            .collect(),
        matched: visible.len(),
        total: record.tasks.len(),
        reported: record.task_count,
        show_all,
    })
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// True for idle/IPC system tasks hidden by default.
pub fn is_hidden_task(name: &str) -> bool {
    HIDDEN_TASKS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Bar with one cell per `100 / width` percent, clamped to `[0, width]`.
pub fn usage_bar(percent: f64, width: usize) -> Bar {
    let fraction = if percent.is_finite() {
        (percent / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Bar {
        percent,
        filled: ((fraction * width as f64) as usize).min(width),
        width,
    }
}

/// Human-readable size in the largest of B / KiB / MiB that is at least 1.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Compact per-task memory: whole KiB as `NK`, otherwise `NB`.
pub fn format_task_mem(bytes: u64) -> String {
    if bytes >= 1024 {
        format!("{}K", bytes / 1024)
    } else {
        format!("{bytes}B")
    }
}

/// Device uptime as `Nd HH:MM:SS`.
pub fn format_uptime(uptime_ms: u64) -> String {
    let secs = uptime_ms / 1000;
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (hours, rem) = (rem / 3600, rem % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
