//! Report delivery
//!
//! Turns a published snapshot into a serializable [`Report`] and hands it to a
//! [`ReportSink`].

use crate::alerts::{Alert, AlertSnapshot, AlertSummary, AlertTransition};
use crate::error::{DataError, ReportError};
use crate::models::{Assignment, CrewDutyStatus};
use crate::records::{Severity, Timestamp};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Serializable view of one snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub generated_at: Timestamp,
    pub cycle: u64,
    pub as_of: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub summary: AlertSummary,
    /// Current alerts, worst first
    pub alerts: Vec<Alert>,
    pub history: Vec<AlertTransition>,
    pub assignments: Vec<Assignment>,
    pub crew: Vec<CrewDutyStatus>,
    pub data_errors: Vec<DataError>,
}

impl Report {
    pub fn from_snapshot(snapshot: &AlertSnapshot) -> Self {
        Self {
            generated_at: Utc::now(),
            cycle: snapshot.cycle(),
            as_of: snapshot.as_of(),
            completed_at: snapshot.completed_at(),
            summary: snapshot.summary(),
            alerts: snapshot
                .at_least(Severity::Normal)
                .into_iter()
                .cloned()
                .collect(),
            history: snapshot.history().cloned().collect(),
            assignments: snapshot.assignments().to_vec(),
            crew: snapshot.crew().to_vec(),
            data_errors: snapshot.data_errors().to_vec(),
        }
    }
}

/// Destination for finished reports
pub trait ReportSink {
    /// Deliver one report
    ///
    /// # Errors
    ///
    /// Returns `ReportError` if the report could not be written.
    fn deliver(&mut self, report: &Report) -> Result<(), ReportError>;
}

/// Writes reports as pretty-printed JSON to a file, or stdout when no path is set
#[derive(Debug, Clone, Default)]
pub struct JsonReportSink {
    path: Option<PathBuf>,
}

impl JsonReportSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn stdout() -> Self {
        Self { path: None }
    }
}

impl ReportSink for JsonReportSink {
    fn deliver(&mut self, report: &Report) -> Result<(), ReportError> {
        match &self.path {
            Some(path) => {
                let file = File::create(path).map_err(|e| {
                    ReportError::WriteFailed(format!("{}: {}", path.display(), e))
                })?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, report)?;
                writer.write_all(b"\n")?;
                writer.flush()?;
                info!(
                    "Wrote report for cycle {} to {}",
                    report.cycle,
                    path.display()
                );
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                serde_json::to_writer_pretty(&mut handle, report)?;
                handle.write_all(b"\n")?;
                handle.flush()?;
            }
        }
        Ok(())
    }
}

/// Human-readable summary of a snapshot, worst alerts first
///
/// Alerts at `Normal` are counted but not listed.
pub fn render_summary(snapshot: &AlertSnapshot) -> String {
    let summary = snapshot.summary();
    let mut out = String::new();

    let as_of = snapshot
        .as_of()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "Cycle {} as of {}", snapshot.cycle(), as_of);

    let counts: Vec<String> = Severity::ALL
        .iter()
        .rev()
        .map(|s| {
            let count = summary.by_severity.get(s).copied().unwrap_or(0);
            format!("{:?}: {}", s, count)
        })
        .collect();
    let _ = writeln!(out, "{} alerts ({})", summary.total, counts.join(", "));

    for alert in snapshot.at_least(Severity::Watch) {
        let _ = writeln!(out, "  {}", alert);
    }

    if !snapshot.assignments().is_empty() {
        let _ = writeln!(out, "Assignments:");
        for assignment in snapshot.assignments() {
            let _ = writeln!(
                out,
                "  {} -> {}",
                assignment.flight_id,
                assignment.crew_ids.join(", ")
            );
        }
    }

    if !snapshot.data_errors().is_empty() {
        let _ = writeln!(out, "Skipped records:");
        for err in snapshot.data_errors() {
            let _ = writeln!(out, "  {}", err);
        }
    }
    out
}
