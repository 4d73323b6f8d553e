//! Weighted delay-risk scoring
//!
//! Three sub-scores (weather, maintenance, congestion), each clamped to
//! [0, 1], are combined with configured weights into a single score that is
//! then bucketed by ordered boundaries.

use crate::aggregator::AggregatedFlightMetric;
use crate::config::{DelayThresholds, DelayWeights};
use crate::records::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Delay category, ordered from best to worst
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DelayCategory {
    OnTime,
    Minor,
    Moderate,
    Severe,
}

impl DelayCategory {
    pub fn severity(self) -> Severity {
        match self {
            DelayCategory::OnTime => Severity::Normal,
            DelayCategory::Minor => Severity::Watch,
            DelayCategory::Moderate => Severity::Warning,
            DelayCategory::Severe => Severity::Critical,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DelayCategory::OnTime => "on time",
            DelayCategory::Minor => "minor delay",
            DelayCategory::Moderate => "moderate delay",
            DelayCategory::Severe => "severe delay",
        }
    }
}

/// The sub-score contributing most to a delay score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DelayFactor {
    Weather,
    Maintenance,
    Congestion,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DelaySubScores {
    pub weather: f64,
    pub maintenance: f64,
    pub congestion: f64,
}

impl DelaySubScores {
    /// Derive sub-scores from an aggregated flight, each clamped to [0, 1]
    pub fn from_metric(metric: &AggregatedFlightMetric, thresholds: &DelayThresholds) -> Self {
        Self {
            weather: clamp_unit(metric.peak_weather_severity),
            maintenance: clamp_unit(
                metric.peak_maintenance_issues as f64 / thresholds.maintenance_issue_ceiling,
            ),
            congestion: clamp_unit(metric.mean_congestion),
        }
    }

    /// Weighted sum, clamped to [0, 1]
    pub fn score(&self, weights: &DelayWeights) -> f64 {
        clamp_unit(
            weights.weather * self.weather
                + weights.maintenance * self.maintenance
                + weights.congestion * self.congestion,
        )
    }

    /// Factor with the largest weighted contribution; earlier factors win ties
    pub fn dominant(&self, weights: &DelayWeights) -> DelayFactor {
        let contributions = [
            (DelayFactor::Weather, weights.weather * self.weather),
            (DelayFactor::Maintenance, weights.maintenance * self.maintenance),
            (DelayFactor::Congestion, weights.congestion * self.congestion),
        ];
        let mut best = contributions[0];
        for candidate in &contributions[1..] {
            if candidate.1 > best.1 {
                best = *candidate;
            }
        }
        best.0
    }
}

/// Bucket a score; a score exactly on a boundary goes to the higher category
pub fn categorize(score: f64, thresholds: &DelayThresholds) -> DelayCategory {
    if score >= thresholds.severe_from {
        DelayCategory::Severe
    } else if score >= thresholds.moderate_from {
        DelayCategory::Moderate
    } else if score >= thresholds.minor_from {
        DelayCategory::Minor
    } else {
        DelayCategory::OnTime
    }
}

/// Delay risk for one flight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelayAssessment {
    pub flight_id: String,
    pub route_id: String,
    pub sub_scores: DelaySubScores,
    pub score: f64,
    pub category: DelayCategory,
    pub expected_delay_minutes: f64,
    pub dominant_factor: DelayFactor,
    pub observed_delay_minutes: Option<f64>,
}

pub fn assess(metric: &AggregatedFlightMetric, thresholds: &DelayThresholds) -> DelayAssessment {
    let sub_scores = DelaySubScores::from_metric(metric, thresholds);
    let score = sub_scores.score(&thresholds.weights);
    DelayAssessment {
        flight_id: metric.flight_id.clone(),
        route_id: metric.route_id(),
        sub_scores,
        score,
        category: categorize(score, thresholds),
        expected_delay_minutes: (score * thresholds.delay_horizon_minutes).round(),
        dominant_factor: sub_scores.dominant(&thresholds.weights),
        observed_delay_minutes: metric.observed_delay_minutes,
    }
}

pub fn assess_all(
    flights: &BTreeMap<String, AggregatedFlightMetric>,
    thresholds: &DelayThresholds,
) -> Vec<DelayAssessment> {
    flights.values().map(|f| assess(f, thresholds)).collect()
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::flight_metric;

    #[test]
    fn test_scenario_weather_driven_moderate_delay() {
        let thresholds = DelayThresholds::default();
        let metric = flight_metric("GA1001", 0.9, 0, 0.1);
        let assessment = assess(&metric, &thresholds);

        assert!((assessment.score - 0.55).abs() < 1e-9);
        assert_eq!(assessment.category, DelayCategory::Moderate);
        assert_eq!(assessment.category.severity(), Severity::Warning);
        assert_eq!(assessment.dominant_factor, DelayFactor::Weather);
        assert_eq!(assessment.expected_delay_minutes, 99.0);
    }

    #[test]
    fn test_boundary_goes_to_higher_category() {
        let thresholds = DelayThresholds::default();
        assert_eq!(categorize(0.2, &thresholds), DelayCategory::Minor);
        assert_eq!(categorize(0.5, &thresholds), DelayCategory::Moderate);
        assert_eq!(categorize(0.8, &thresholds), DelayCategory::Severe);
        assert_eq!(categorize(0.19, &thresholds), DelayCategory::OnTime);
    }

    #[test]
    fn test_maintenance_saturates_at_ceiling() {
        let thresholds = DelayThresholds::default();
        let metric = flight_metric("GA1001", 0.0, 7, 0.0);
        let sub = DelaySubScores::from_metric(&metric, &thresholds);
        assert_eq!(sub.maintenance, 1.0);
        assert!((sub.score(&thresholds.weights) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_category_severity_mapping_is_monotonic() {
        let categories = [
            DelayCategory::OnTime,
            DelayCategory::Minor,
            DelayCategory::Moderate,
            DelayCategory::Severe,
        ];
        for pair in categories.windows(2) {
            assert!(pair[0].severity() < pair[1].severity());
        }
    }
}
