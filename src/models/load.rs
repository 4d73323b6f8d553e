use crate::aggregator::BookingMetric;
use crate::config::LoadThresholds;
use crate::records::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LoadCategory {
    Low,
    Normal,
    High,
    Overbooked,
}

impl LoadCategory {
    /// Under-utilisation is a soft signal, overbooking is critical
    pub fn severity(self) -> Severity {
        match self {
            LoadCategory::Low => Severity::Watch,
            LoadCategory::Normal => Severity::Normal,
            LoadCategory::High => Severity::Watch,
            LoadCategory::Overbooked => Severity::Critical,
        }
    }
}

/// Expected load for one flight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadAssessment {
    pub flight_id: String,
    pub bookings: u32,
    pub capacity: u32,
    pub trend: f64,
    pub no_show_rate: f64,
    pub projected_load_factor: f64,
    pub category: LoadCategory,
    pub overbooking_risk: bool,
}

/// Bookings projected forward by the demand trend, net of no-shows, over capacity
pub fn projected_load_factor(metric: &BookingMetric, no_show_rate: f64) -> f64 {
    let projected = metric.bookings as f64 * (1.0 + metric.trend) * (1.0 - no_show_rate);
    (projected / metric.capacity as f64).max(0.0)
}

pub fn categorize(load_factor: f64, t: &LoadThresholds) -> LoadCategory {
    if load_factor > t.overbooking_ceiling {
        LoadCategory::Overbooked
    } else if load_factor >= t.high_load_floor {
        LoadCategory::High
    } else if load_factor < t.low_load_ceiling {
        LoadCategory::Low
    } else {
        LoadCategory::Normal
    }
}

pub fn assess(metric: &BookingMetric, t: &LoadThresholds) -> LoadAssessment {
    let no_show_rate = metric.no_show_rate.unwrap_or(t.default_no_show_rate);
    let load_factor = projected_load_factor(metric, no_show_rate);
    let category = categorize(load_factor, t);
    LoadAssessment {
        flight_id: metric.flight_id.clone(),
        bookings: metric.bookings,
        capacity: metric.capacity,
        trend: metric.trend,
        no_show_rate,
        projected_load_factor: load_factor,
        category,
        overbooking_risk: category == LoadCategory::Overbooked,
    }
}

pub fn assess_all(bookings: &BTreeMap<String, BookingMetric>, t: &LoadThresholds) -> Vec<LoadAssessment> {
    bookings.values().map(|b| assess(b, t)).collect()
}
