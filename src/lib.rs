/// Error types for the risk engine
pub mod error;

/// Raw input record types
pub mod records;

/// Input collaborator and raw batches
pub mod ingest;

/// Per-cycle metric aggregation
pub mod aggregator;

/// Delay, health, crew, load and route risk models
pub mod models;

/// Alert classification and shared alert state
pub mod alerts;

/// Configuration management
pub mod config;

/// One-cycle orchestration
pub mod engine;

/// Background monitoring loop
pub mod monitoring;

/// Report rendering and delivery
pub mod report;

// Re-export commonly used types
pub use engine::RiskEngine;
pub use error::{ConfigError, DataError, MonitorError, ReportError, SourceError};
pub use monitoring::{run_once, MonitoringLoop};
