/// Normalization of raw records into per-cycle metrics
pub mod metric_aggregator;

pub use metric_aggregator::{
    aggregate, AggregatedAircraftMetric, AggregatedFlightMetric, BookingMetric, CycleMetrics,
};
