//! Dashboard state owned by the controller loop.

use std::fmt;
use std::time::{Duration, Instant};

use crate::rate::RateEstimator;
use crate::record::TelemetryRecord;

/// A record older than this is flagged as stale on screen.
pub const STALE_AFTER: Duration = Duration::from_secs(5);

/// Lifecycle phase of the dashboard.
///
/// `Connecting → Running ⇄ Paused`, `Running/Paused → Disconnected → Running/Paused`,
/// and any phase `→ ShuttingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Connecting,
    Running,
    Paused,
    /// The link failed after startup; reconnects are being attempted.
    Disconnected,
    ShuttingDown,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Disconnected => "DISCONNECTED",
            Self::ShuttingDown => "STOPPING",
        }
    }

    /// Whether the loop should be pulling lines from the link.
    pub fn reads_telemetry(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Static description of the link shown in header and footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub port: String,
    pub baud: u32,
}

/// Everything the panels need that is not a history series.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub phase: Phase,
    /// Last successfully parsed record; `None` until the first one arrives.
    pub record: Option<TelemetryRecord>,
    pub record_at: Option<Instant>,
    pub started_at: Instant,
    pub rates: RateEstimator,
    pub records_received: u64,
    pub parse_errors: u64,
    pub read_errors: u64,
    pub reconnects: u64,
    pub link: LinkInfo,
}

impl DashboardState {
    pub fn new(link: LinkInfo, started_at: Instant) -> Self {
        Self::with_rates(link, started_at, RateEstimator::new(started_at))
    }

    pub fn with_rates(link: LinkInfo, started_at: Instant, rates: RateEstimator) -> Self {
        Self {
            phase: Phase::Connecting,
            record: None,
            record_at: None,
            started_at,
            rates,
            records_received: 0,
            parse_errors: 0,
            read_errors: 0,
            reconnects: 0,
            link,
        }
    }

    /// Age of the current record, if any.
    pub fn record_age(&self, now: Instant) -> Option<Duration> {
        self.record_at.map(|t| now.saturating_duration_since(t))
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        self.record_age(now).is_some_and(|age| age > STALE_AFTER)
    }
}
