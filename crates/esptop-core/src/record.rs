//! Telemetry record decoding.
//!
//! The device prints one JSON object per line. Every field is optional on the
//! wire; [`parse_record`] resolves each missing field to its documented
//! default independently of the others, so a record is only rejected when the
//! line is not a well-formed object or a present field has the wrong type.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

/// Total SRAM assumed when the device does not report `total_heap` (ESP32).
pub const DEFAULT_TOTAL_HEAP: u64 = 327_680;

/// Maximum processor frequency assumed when `max_cpu_mhz` is absent (ESP32).
pub const DEFAULT_MAX_CPU_MHZ: f64 = 240.0;

/// Task name used when a task entry has no `name`.
pub const DEFAULT_TASK_NAME: &str = "unknown";

/// Owner label used when a task entry has no `user`.
pub const DEFAULT_TASK_USER: &str = "system";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a line could not be turned into a [`TelemetryRecord`].
///
/// Always recoverable: the caller keeps its last good record and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The line held nothing but whitespace.
    #[error("empty line")]
    Empty,
    /// Syntax error, truncated object, or a field of the wrong type.
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

/// One task row reported by the device scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub pid: u64,
    pub name: String,
    /// Command string; the task name when the device omits it.
    pub cmd: String,
    pub threads: u64,
    pub user: String,
    /// Memory attributed to the task, in bytes.
    pub mem: u64,
    /// Share of processor time, in percent.
    pub cpu: f64,
}

/// A fully defaulted snapshot of device state.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Free heap, bytes.
    pub heap: u64,
    /// Lowest free heap ever observed by the device, bytes.
    pub min_heap: u64,
    /// Total heap, bytes.
    pub total_heap: u64,
    /// Wi-Fi signal strength, dBm.
    pub rssi: i64,
    pub cpu_mhz: f64,
    pub max_cpu_mhz: f64,
    /// Core 0 load in percent; half the aggregate load when unreported.
    pub cpu_core0: f64,
    /// Core 1 load in percent; half the aggregate load when unreported.
    pub cpu_core1: f64,
    pub uptime_ms: u64,
    /// Upload rate reported by the device, KB/s.
    pub tx_rate: f64,
    /// Number of tasks the device says it runs (may exceed `tasks.len()`).
    pub task_count: u64,
    pub tasks: Vec<TaskRecord>,
}

impl TelemetryRecord {
    /// Aggregate processor load: `cpu_mhz / max_cpu_mhz * 100`.
    pub fn cpu_percent(&self) -> f64 {
        cpu_percent(self.cpu_mhz, self.max_cpu_mhz)
    }

    /// Heap in use. Zero when the device did not report free heap.
    pub fn used_heap(&self) -> u64 {
        if self.heap == 0 {
            0
        } else {
            self.total_heap.saturating_sub(self.heap)
        }
    }

    /// Heap usage in percent of `total_heap`.
    pub fn heap_percent(&self) -> f64 {
        if self.total_heap == 0 {
            return 0.0;
        }
        self.used_heap() as f64 / self.total_heap as f64 * 100.0
    }
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            heap: 0,
            min_heap: 0,
            total_heap: DEFAULT_TOTAL_HEAP,
            rssi: 0,
            cpu_mhz: 0.0,
            max_cpu_mhz: DEFAULT_MAX_CPU_MHZ,
            cpu_core0: 0.0,
            cpu_core1: 0.0,
            uptime_ms: 0,
            tx_rate: 0.0,
            task_count: 0,
            tasks: Vec::new(),
        }
    }
}

fn cpu_percent(mhz: f64, max_mhz: f64) -> f64 {
    if max_mhz > 0.0 {
        mhz / max_mhz * 100.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Top level of a line. Only a JSON object qualifies; serde's derived
/// struct impls would also accept an array and fill fields by position.
type WireObject = Map<String, Value>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireRecord {
    #[serde(deserialize_with = "count")]
    heap: u64,
    #[serde(deserialize_with = "count")]
    min_heap: u64,
    #[serde(deserialize_with = "opt_count")]
    total_heap: Option<u64>,
    #[serde(deserialize_with = "signed")]
    rssi: i64,
    cpu_mhz: f64,
    max_cpu_mhz: Option<f64>,
    cpu_core0: Option<f64>,
    cpu_core1: Option<f64>,
    #[serde(deserialize_with = "count")]
    uptime_ms: u64,
    tx_rate: f64,
    #[serde(deserialize_with = "count")]
    task_count: u64,
    tasks: Vec<WireObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireTask {
    #[serde(deserialize_with = "count")]
    pid: u64,
    name: Option<String>,
    cmd: Option<String>,
    #[serde(deserialize_with = "opt_count")]
    threads: Option<u64>,
    user: Option<String>,
    #[serde(deserialize_with = "count")]
    mem: u64,
    cpu: f64,
}

impl WireRecord {
    fn from_object(object: WireObject) -> Result<Self, serde_json::Error> {
        Self::deserialize(Value::Object(object))
    }

    fn into_record(self) -> Result<TelemetryRecord, serde_json::Error> {
        let max_cpu_mhz = self.max_cpu_mhz.unwrap_or(DEFAULT_MAX_CPU_MHZ);
        let half = cpu_percent(self.cpu_mhz, max_cpu_mhz) * 0.5;
        let tasks = self
            .tasks
            .into_iter()
            .map(|t| WireTask::deserialize(Value::Object(t)).map(WireTask::into_task))
            .collect::<Result<_, _>>()?;
        Ok(TelemetryRecord {
            heap: self.heap,
            min_heap: self.min_heap,
            total_heap: self.total_heap.unwrap_or(DEFAULT_TOTAL_HEAP),
            rssi: self.rssi,
            cpu_mhz: self.cpu_mhz,
            max_cpu_mhz,
            cpu_core0: self.cpu_core0.unwrap_or(half),
            cpu_core1: self.cpu_core1.unwrap_or(half),
            uptime_ms: self.uptime_ms,
            tx_rate: self.tx_rate,
            task_count: self.task_count,
            tasks,
        })
    }
}

impl WireTask {
    fn into_task(self) -> TaskRecord {
        let name = self.name.unwrap_or_else(|| DEFAULT_TASK_NAME.to_string());
        TaskRecord {
            pid: self.pid,
            cmd: self.cmd.unwrap_or_else(|| name.clone()),
            name,
            threads: self.threads.unwrap_or(1),
            user: self.user.unwrap_or_else(|| DEFAULT_TASK_USER.to_string()),
            mem: self.mem,
            cpu: self.cpu,
        }
    }
}

// Counts accept any JSON number: fractions truncate, negatives clamp to 0,
// out-of-range values saturate. Non-numbers are still type errors.

fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Number::deserialize(d).map(|n| number_to_count(&n))
}

fn opt_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Option::<Number>::deserialize(d).map(|n| n.as_ref().map(number_to_count))
}

fn signed<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let n = Number::deserialize(d)?;
    Ok(match (n.as_i64(), n.as_u64()) {
        (Some(i), _) => i,
        (None, Some(_)) => i64::MAX,
        // `as` saturates; NaN cannot come out of JSON.
        _ => n.as_f64().map_or(0, |f| f as i64),
    })
}

fn number_to_count(n: &Number) -> u64 {
    if let Some(u) = n.as_u64() {
        u
    } else if n.is_i64() {
        0
    } else {
        n.as_f64().map_or(0, |f| f.max(0.0) as u64)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Decode one raw line (terminator optional) into a [`TelemetryRecord`].
///
/// Invalid UTF-8 is replaced rather than rejected, matching how serial
/// consoles tend to glitch on the first line after a reset.
pub fn parse_record(line: &[u8]) -> Result<TelemetryRecord, ParseError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    let object: WireObject = serde_json::from_str(text)?;
    Ok(WireRecord::from_object(object)?.into_record()?)
}
