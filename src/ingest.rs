//! Input collaborator: where each cycle's raw records come from
//!
//! Records arrive as loosely-typed JSON mappings so that one malformed record
//! can be reported and skipped without rejecting the whole batch.

use crate::error::SourceError;
use crate::records::Timestamp;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One batch of raw records, grouped by record kind
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawBatch {
    /// Cycle timestamp; the engine uses the current time when absent
    pub as_of: Option<Timestamp>,
    pub flights: Vec<Value>,
    pub aircraft: Vec<Value>,
    pub bookings: Vec<Value>,
    pub crew: Vec<Value>,
    pub routes: Vec<Value>,
}

impl RawBatch {
    /// Total number of raw records across all kinds
    pub fn record_count(&self) -> usize {
        self.flights.len()
            + self.aircraft.len()
            + self.bookings.len()
            + self.crew.len()
            + self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

/// Supplies a fresh batch before every cycle
#[cfg_attr(test, mockall::automock)]
pub trait RecordSource: Send {
    /// Fetch the records for the next cycle
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the batch cannot be read at all. Individual
    /// malformed records are not errors here.
    fn fetch(&mut self) -> Result<RawBatch, SourceError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Reads a JSON batch file, re-reading it on every fetch
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for JsonFileSource {
    fn fetch(&mut self) -> Result<RawBatch, SourceError> {
        debug!("Reading input batch from {}", self.path.display());
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| SourceError::ReadError(format!("{}: {}", self.path.display(), e)))?;
        let batch: RawBatch = serde_json::from_str(&contents)
            .map_err(|e| SourceError::ParseError(format!("{}: {}", self.path.display(), e)))?;
        info!(
            "Loaded {} raw records from {}",
            batch.record_count(),
            self.path.display()
        );
        Ok(batch)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Hands out the same batch on every fetch
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    batch: RawBatch,
}

impl StaticSource {
    pub fn new(batch: RawBatch) -> Self {
        Self { batch }
    }
}

impl RecordSource for StaticSource {
    fn fetch(&mut self) -> Result<RawBatch, SourceError> {
        Ok(self.batch.clone())
    }

    fn describe(&self) -> String {
        format!("static batch of {} records", self.batch.record_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_sections_default_to_empty() {
        let batch: RawBatch = serde_json::from_str(r#"{"flights": [{"flight_id": "GA1001"}]}"#).unwrap();
        assert_eq!(batch.flights.len(), 1);
        assert!(batch.aircraft.is_empty());
        assert!(batch.as_of.is_none());
        assert_eq!(batch.record_count(), 1);
    }

    #[test]
    fn test_json_file_source_reads_batch() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"as_of": "2024-06-01T00:00:00Z", "routes": [{"route_id": "DEL-BOM"}]}"#,
        )
        .unwrap();

        let mut source = JsonFileSource::new(file.path());
        let batch = source.fetch().unwrap();
        assert!(batch.as_of.is_some());
        assert_eq!(batch.routes.len(), 1);
    }

    #[test]
    fn test_json_file_source_errors() {
        let mut missing = JsonFileSource::new("/nonexistent/batch.json");
        assert!(matches!(missing.fetch(), Err(SourceError::ReadError(_))));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let mut garbled = JsonFileSource::new(file.path());
        assert!(matches!(garbled.fetch(), Err(SourceError::ParseError(_))));
    }

    #[test]
    fn test_static_source_repeats_batch() {
        let batch = RawBatch {
            crew: vec![serde_json::json!({"crew_id": "C1"})],
            ..RawBatch::default()
        };
        let mut source = StaticSource::new(batch.clone());
        assert_eq!(source.fetch().unwrap(), batch);
        assert_eq!(source.fetch().unwrap(), batch);
    }
}
