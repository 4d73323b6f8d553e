use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during configuration loading or hot reload
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Kind of raw input record, used to identify the offender in a `DataError`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Flight,
    Aircraft,
    Booking,
    Crew,
    Route,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Flight => "flight",
            RecordKind::Aircraft => "aircraft",
            RecordKind::Booking => "booking",
            RecordKind::Crew => "crew",
            RecordKind::Route => "route",
        };
        f.write_str(name)
    }
}

/// A single malformed input record
///
/// Recovered locally: the record is skipped and the cycle continues with the
/// remaining valid records.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[error("malformed {kind} record '{record_id}': {reason}")]
pub struct DataError {
    /// Which collection the record came from
    pub kind: RecordKind,
    /// Identifier of the record, or `#<index>` when it carries none
    pub record_id: String,
    /// What was wrong with it
    pub reason: String,
}

impl DataError {
    pub fn new(kind: RecordKind, record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            record_id: record_id.into(),
            reason: reason.into(),
        }
    }
}

/// No qualified, duty-compliant crew member could be found for a flight
///
/// Never propagated as a failure; the crew optimizer turns it into a
/// shortage alert.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[error("no compliant crew for flight {flight_id}: {assigned} of {required} positions filled")]
pub struct AssignmentInfeasible {
    pub flight_id: String,
    pub required: u32,
    pub assigned: u32,
}

/// A required aircraft sensor reading was absent from the latest poll
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[error("aircraft {registration} missing {reading} reading")]
pub struct SensorMissing {
    pub registration: String,
    pub reading: String,
}

/// Errors raised by the input collaborator while fetching a batch
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read input: {0}")]
    ReadError(String),

    #[error("Failed to parse input batch: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors that can occur while starting or stopping the monitoring loop
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Monitoring loop is already running")]
    AlreadyRunning,

    #[error("Failed to spawn monitoring thread: {0}")]
    ThreadSpawn(String),

    #[error("Monitoring thread terminated abnormally")]
    ThreadPanicked,
}

/// Errors raised while handing a snapshot to the reporting collaborator
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_display_names_record() {
        let err = DataError::new(RecordKind::Flight, "GA1001", "missing field `origin`");
        assert_eq!(
            err.to_string(),
            "malformed flight record 'GA1001': missing field `origin`"
        );
    }

    #[test]
    fn test_validation_error_joins_problems() {
        let err = ConfigError::ValidationError(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Invalid configuration: a; b");
    }

    #[test]
    fn test_assignment_infeasible_display() {
        let err = AssignmentInfeasible {
            flight_id: "GA1002".to_string(),
            required: 2,
            assigned: 1,
        };
        assert_eq!(
            err.to_string(),
            "no compliant crew for flight GA1002: 1 of 2 positions filled"
        );
    }
}
