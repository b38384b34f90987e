//! Append-only statistics ledger and the durable session artifacts.
//!
//! The in-memory counters are ephemeral; the progress log is the only
//! durable record of individual failures, so every failure entry carries the
//! seed needed to reproduce it. The final report (text table plus a
//! `schema_version`-tagged JSON twin) is the sole externally consumed output
//! of a session.

use crate::driver::Outcome;
use crate::error::BatteryError;
use crate::registry::Registry;
use battery_core::{append_line, atomic_write_bytes};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub suite: String,
    pub case: String,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub schema_version: &'static str,
    /// "complete" for a finalized session, "partial" when flushed because a
    /// fatal error ended the session early.
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub budget_hours: f64,
    pub iterations: u64,
    pub entries: Vec<ReportEntry>,
    pub total_successes: u64,
    pub total_failures: u64,
}

#[derive(Debug)]
pub struct RecordKeeper {
    counts: BTreeMap<(String, String), Counts>,
    log_path: PathBuf,
    report_txt_path: PathBuf,
    report_json_path: PathBuf,
    started_at: DateTime<Utc>,
    budget: Duration,
    iterations: u64,
}

fn record_err(path: &Path, source: anyhow::Error) -> BatteryError {
    BatteryError::Record {
        path: path.to_path_buf(),
        message: format!("{:#}", source),
    }
}

impl RecordKeeper {
    /// Zero a counter for every registry pair and write the session header
    /// to the progress log.
    pub fn initialize(
        registry: &Registry,
        base_dir: &Path,
        started_at: DateTime<Utc>,
        budget: Duration,
    ) -> Result<Self, BatteryError> {
        let mut counts = BTreeMap::new();
        for pair in registry.pairs() {
            counts.insert(pair, Counts::default());
        }
        let log_path = base_dir.join("battery.log");
        // One session's worth of entries per log file.
        match std::fs::remove_file(&log_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(record_err(&log_path, e.into())),
        }
        let keeper = Self {
            counts,
            log_path,
            report_txt_path: base_dir.join("report.txt"),
            report_json_path: base_dir.join("report.json"),
            started_at,
            budget,
            iterations: 0,
        };
        keeper.log(&format!(
            "session start {} budget {:.2}h pairs {}",
            started_at.to_rfc3339(),
            budget.as_secs_f64() / 3600.0,
            keeper.counts.len(),
        ))?;
        Ok(keeper)
    }

    fn log(&self, line: &str) -> Result<(), BatteryError> {
        append_line(&self.log_path, line).map_err(|e| record_err(&self.log_path, e))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn counts(&self, suite: &str, case: &str) -> Option<Counts> {
        self.counts
            .get(&(suite.to_string(), case.to_string()))
            .copied()
    }

    /// Record one iteration: bump exactly one counter and append the log
    /// entry. Failures additionally get their seed, timestamp, and full
    /// diagnostic appended so they stay reproducible after the process ends.
    pub fn update(
        &mut self,
        suite: &str,
        case: &str,
        seed: u64,
        outcome: &Outcome,
    ) -> Result<(), BatteryError> {
        let key = (suite.to_string(), case.to_string());
        let counts = self.counts.get_mut(&key).ok_or_else(|| {
            BatteryError::Registry(format!("'{}::{}' was never registered", suite, case))
        })?;
        self.iterations += 1;
        let now = Utc::now();
        match outcome {
            Outcome::Success => {
                counts.successes += 1;
                self.log(&format!("{} ok   {}::{} seed {}", now.to_rfc3339(), suite, case, seed))?;
            }
            Outcome::Failure(diagnostic) => {
                counts.failures += 1;
                self.log(&format!(
                    "{} FAIL {}::{} seed {}",
                    now.to_rfc3339(),
                    suite,
                    case,
                    seed
                ))?;
                for line in diagnostic.lines() {
                    self.log(&format!("    {}", line))?;
                }
            }
        }
        Ok(())
    }

    fn build_report(&self, status: &str) -> Report {
        let mut entries = Vec::with_capacity(self.counts.len());
        let mut total_successes = 0u64;
        let mut total_failures = 0u64;
        for ((suite, case), counts) in &self.counts {
            total_successes += counts.successes;
            total_failures += counts.failures;
            entries.push(ReportEntry {
                suite: suite.clone(),
                case: case.clone(),
                successes: counts.successes,
                failures: counts.failures,
            });
        }
        Report {
            schema_version: "battery_report_v1",
            status: status.to_string(),
            started_at: self.started_at,
            generated_at: Utc::now(),
            budget_hours: self.budget.as_secs_f64() / 3600.0,
            iterations: self.iterations,
            entries,
            total_successes,
            total_failures,
        }
    }

    fn render_table(report: &Report) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "property test battery report ({}) generated {}\n",
            report.status,
            report.generated_at.to_rfc3339()
        ));
        out.push_str(&format!(
            "session started {} budget {:.2}h iterations {}\n\n",
            report.started_at.to_rfc3339(),
            report.budget_hours,
            report.iterations
        ));
        let width = report
            .entries
            .iter()
            .map(|e| e.suite.len() + e.case.len() + 2)
            .max()
            .unwrap_or(8)
            .max(8);
        out.push_str(&format!(
            "{:<w$} {:>9} {:>9}\n",
            "test",
            "success",
            "failure",
            w = width
        ));
        out.push_str(&format!("{}\n", "-".repeat(width + 20)));
        for entry in &report.entries {
            out.push_str(&format!(
                "{:<w$} {:>9} {:>9}\n",
                format!("{}::{}", entry.suite, entry.case),
                entry.successes,
                entry.failures,
                w = width
            ));
        }
        out.push_str(&format!("{}\n", "-".repeat(width + 20)));
        out.push_str(&format!(
            "{:<w$} {:>9} {:>9}\n",
            "total",
            report.total_successes,
            report.total_failures,
            w = width
        ));
        out
    }

    fn write_report(&self, status: &str) -> Result<Report, BatteryError> {
        let report = self.build_report(status);
        let table = Self::render_table(&report);
        atomic_write_bytes(&self.report_txt_path, table.as_bytes())
            .map_err(|e| record_err(&self.report_txt_path, e))?;
        let json = serde_json::to_vec_pretty(&report)
            .map_err(|e| record_err(&self.report_json_path, e.into()))?;
        atomic_write_bytes(&self.report_json_path, &json)
            .map_err(|e| record_err(&self.report_json_path, e))?;
        Ok(report)
    }

    /// End-of-session summary artifacts.
    pub fn finalize(&self) -> Result<Report, BatteryError> {
        self.log(&format!(
            "session end {} iterations {}",
            Utc::now().to_rfc3339(),
            self.iterations
        ))?;
        let report = self.write_report("complete")?;
        info!(
            iterations = report.iterations,
            failures = report.total_failures,
            report = %self.report_txt_path.display(),
            "session report written"
        );
        Ok(report)
    }

    /// Flush whatever accumulated before a fatal error; partial progress is
    /// never silently lost.
    pub fn flush_partial(&self) -> Result<Report, BatteryError> {
        self.log(&format!(
            "session aborted {} iterations {}",
            Utc::now().to_rfc3339(),
            self.iterations
        ))?;
        self.write_report("partial")
    }
}
