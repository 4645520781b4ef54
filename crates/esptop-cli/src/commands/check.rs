//! `esptop check`: validate a captured telemetry log offline.
//!
//! Every line goes through the same decoder the dashboard uses. The command
//! exits non-zero when any line fails to decode.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use esptop_core::parse_record;
use esptop_core::panels::is_hidden_task;
use serde::Serialize;

/// Failures listed individually; the rest are only counted.
const MAX_LISTED_FAILURES: usize = 20;

#[derive(Debug, Default, Serialize)]
pub struct CheckReport {
    pub lines: u64,
    pub records: u64,
    pub failures: u64,
    pub failed_lines: Vec<LineFailure>,
    /// Lowest `heap` seen, bytes.
    pub min_heap: Option<u64>,
    /// Lowest `min_heap` watermark reported.
    pub min_watermark: Option<u64>,
    /// Highest CPU load, percent of max clock.
    pub peak_cpu_percent: Option<f64>,
    pub max_tasks: usize,
    /// Tasks other than idle/IPC seen in the largest list.
    pub max_user_tasks: usize,
    pub rssi_range: Option<(i64, i64)>,
}

#[derive(Debug, Serialize)]
pub struct LineFailure {
    pub line: u64,
    pub error: String,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.failures == 0
    }
}

pub fn check_lines<R: BufRead>(mut reader: R) -> io::Result<CheckReport> {
    let mut report = CheckReport::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        report.lines += 1;

        let rec = match parse_record(&buf) {
            Ok(rec) => rec,
            Err(e) => {
                report.failures += 1;
                if report.failed_lines.len() < MAX_LISTED_FAILURES {
                    report.failed_lines.push(LineFailure {
                        line: report.lines,
                        error: e.to_string(),
                    });
                }
                continue;
            }
        };

        report.records += 1;
        report.min_heap = Some(report.min_heap.map_or(rec.heap, |m| m.min(rec.heap)));
        report.min_watermark = Some(
            report
                .min_watermark
                .map_or(rec.min_heap, |m| m.min(rec.min_heap)),
        );
        let cpu = rec.cpu_percent();
        report.peak_cpu_percent = Some(report.peak_cpu_percent.map_or(cpu, |p| p.max(cpu)));
        report.rssi_range = Some(match report.rssi_range {
            Some((lo, hi)) => (lo.min(rec.rssi), hi.max(rec.rssi)),
            None => (rec.rssi, rec.rssi),
        });
        if rec.tasks.len() > report.max_tasks {
            report.max_tasks = rec.tasks.len();
            report.max_user_tasks = rec.tasks.iter().filter(|t| !is_hidden_task(&t.name)).count();
        }
    }

    Ok(report)
}

pub fn run(path: &Path, json: bool) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: cannot open {}: {e}", path.display());
            std::process::exit(1);
        }
    };

    let report = match check_lines(BufReader::new(file)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: reading {}: {e}", path.display());
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        print_report(path, &report);
    }

    if !report.passed() {
        std::process::exit(1);
    }
}

fn print_report(path: &Path, report: &CheckReport) {
    println!("📟 {}", path.display());
    println!(
        "  {} lines, {} records, {} failed",
        report.lines, report.records, report.failures
    );
    if let (Some(heap), Some(mark)) = (report.min_heap, report.min_watermark) {
        println!("  Lowest free heap: {heap} B (watermark {mark} B)");
    }
    if let Some(cpu) = report.peak_cpu_percent {
        println!("  Peak CPU:         {cpu:.1}%");
    }
    if let Some((lo, hi)) = report.rssi_range {
        println!("  RSSI:             {lo} .. {hi} dBm");
    }
    println!(
        "  Tasks:            {} ({} excluding idle/IPC)",
        report.max_tasks, report.max_user_tasks
    );

    for f in &report.failed_lines {
        println!("  ✗ line {}: {}", f.line, f.error);
    }
    let unlisted = report.failures.saturating_sub(report.failed_lines.len() as u64);
    if unlisted > 0 {
        println!("  … and {unlisted} more");
    }
}
