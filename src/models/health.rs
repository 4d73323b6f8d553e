//! Aircraft health checks
//!
//! Each subsystem is evaluated on its own; the aircraft-level severity then
//! follows a compounding-failure policy where two simultaneous breaches are
//! treated as critical even though each alone would only be a warning.

use crate::aggregator::AggregatedAircraftMetric;
use crate::config::HealthThresholds;
use crate::error::SensorMissing;
use crate::records::{AircraftMetric, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Rated thrust that engine thrust deviation is measured against
const RATED_THRUST_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Engine,
    Cabin,
    Fuel,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subsystem::Engine => "engine",
            Subsystem::Cabin => "cabin",
            Subsystem::Fuel => "fuel",
        };
        f.write_str(name)
    }
}

/// Subsystem status, ordered from best to worst
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemStatus {
    Nominal,
    Marginal,
    Breach,
    SensorFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubsystemCheck {
    pub subsystem: Subsystem,
    pub status: SubsystemStatus,
    /// One entry per reading that is marginal or out of bounds
    pub findings: Vec<String>,
    pub missing: Vec<SensorMissing>,
    /// Some reading is out of bounds, even if a sensor failure outranks it
    #[serde(default)]
    pub breached: bool,
}

impl SubsystemCheck {
    fn new(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            status: SubsystemStatus::Nominal,
            findings: Vec::new(),
            missing: Vec::new(),
            breached: false,
        }
    }

    fn raise(&mut self, status: SubsystemStatus, finding: String) {
        self.breached |= status == SubsystemStatus::Breach;
        self.status = self.status.max(status);
        self.findings.push(finding);
    }

    /// Fetch a reading, recording a sensor failure when it is absent
    fn require(&mut self, registration: &str, name: &str, reading: Option<f64>) -> Option<f64> {
        if reading.is_none() {
            self.missing.push(SensorMissing {
                registration: registration.to_string(),
                reading: name.to_string(),
            });
            self.raise(SubsystemStatus::SensorFailure, format!("{} reading missing", name));
        }
        reading
    }

    /// Compare a reading against an upper limit, with a marginal zone below it
    fn ceiling(&mut self, name: &str, value: f64, limit: f64, watch_ratio: f64) {
        if value > limit {
            self.raise(
                SubsystemStatus::Breach,
                format!("{} {:.1} exceeds {:.1}", name, value, limit),
            );
        } else if value >= limit * watch_ratio {
            self.raise(
                SubsystemStatus::Marginal,
                format!("{} {:.1} near limit {:.1}", name, value, limit),
            );
        }
    }
}

pub fn check_engine(poll: &AircraftMetric, t: &HealthThresholds) -> SubsystemCheck {
    let mut check = SubsystemCheck::new(Subsystem::Engine);
    if let Some(vibration) = check.require(&poll.registration, "engine_vibration", poll.engine_vibration) {
        check.ceiling("vibration", vibration, t.vibration_ceiling, t.watch_ratio);
    }
    if let Some(thrust) = check.require(&poll.registration, "engine_thrust", poll.engine_thrust) {
        let deviation = (thrust - RATED_THRUST_PERCENT).abs();
        check.ceiling("thrust deviation", deviation, t.thrust_deviation_max, t.watch_ratio);
    }
    check
}

/// Cabin pressure is a band with no marginal zone; temperature is a ceiling
pub fn check_cabin(poll: &AircraftMetric, t: &HealthThresholds) -> SubsystemCheck {
    let mut check = SubsystemCheck::new(Subsystem::Cabin);
    if let Some(pressure) = check.require(&poll.registration, "cabin_pressure", poll.cabin_pressure) {
        if pressure < t.cabin_pressure_floor || pressure > t.cabin_pressure_ceiling {
            check.raise(
                SubsystemStatus::Breach,
                format!(
                    "cabin pressure {:.0} outside {:.0}-{:.0} hPa",
                    pressure, t.cabin_pressure_floor, t.cabin_pressure_ceiling
                ),
            );
        }
    }
    if let Some(temperature) =
        check.require(&poll.registration, "cabin_temperature", poll.cabin_temperature)
    {
        check.ceiling(
            "cabin temperature",
            temperature,
            t.cabin_temperature_ceiling,
            t.watch_ratio,
        );
    }
    check
}

pub fn check_fuel(poll: &AircraftMetric, t: &HealthThresholds) -> SubsystemCheck {
    let mut check = SubsystemCheck::new(Subsystem::Fuel);
    if let Some(consumption) =
        check.require(&poll.registration, "fuel_consumption", poll.fuel_consumption)
    {
        check.ceiling(
            "fuel consumption",
            consumption,
            t.fuel_consumption_ceiling,
            t.watch_ratio,
        );
    }
    check
}

/// Aircraft-level severity from the subsystem checks
///
/// Any sensor failure or two or more breached subsystems is critical, a
/// single breach is a warning, and any marginal reading is a watch.
pub fn overall_severity(checks: &[SubsystemCheck]) -> Severity {
    let breaches = checks
        .iter()
        .filter(|c| c.breached)
        .count();
    if checks.iter().any(|c| c.status == SubsystemStatus::SensorFailure) || breaches >= 2 {
        Severity::Critical
    } else if breaches == 1 {
        Severity::Warning
    } else if checks.iter().any(|c| c.status == SubsystemStatus::Marginal) {
        Severity::Watch
    } else {
        Severity::Normal
    }
}

/// Health of one aircraft as of its latest poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthAssessment {
    pub registration: String,
    pub checks: Vec<SubsystemCheck>,
    pub breach_count: usize,
    pub severity: Severity,
    /// Readings of the latest poll that were present
    pub readings: BTreeMap<String, f64>,
    pub sample_count: usize,
    pub peak_vibration: Option<f64>,
    pub mean_fuel_consumption: Option<f64>,
}

impl HealthAssessment {
    pub fn missing(&self) -> impl Iterator<Item = &SensorMissing> {
        self.checks.iter().flat_map(|c| c.missing.iter())
    }

    pub fn findings(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .flat_map(|c| c.findings.iter().map(String::as_str))
    }
}

pub fn assess(metric: &AggregatedAircraftMetric, thresholds: &HealthThresholds) -> HealthAssessment {
    let poll = &metric.latest;
    let checks = vec![
        check_engine(poll, thresholds),
        check_cabin(poll, thresholds),
        check_fuel(poll, thresholds),
    ];
    let breach_count = checks
        .iter()
        .filter(|c| c.breached)
        .count();
    let readings = [
        ("engine_vibration", poll.engine_vibration),
        ("engine_thrust", poll.engine_thrust),
        ("cabin_pressure", poll.cabin_pressure),
        ("cabin_temperature", poll.cabin_temperature),
        ("fuel_consumption", poll.fuel_consumption),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
    .collect();
    HealthAssessment {
        registration: metric.registration.clone(),
        severity: overall_severity(&checks),
        checks,
        breach_count,
        readings,
        sample_count: metric.sample_count,
        peak_vibration: metric.peak_vibration,
        mean_fuel_consumption: metric.mean_fuel_consumption,
    }
}

pub fn assess_all(
    aircraft: &BTreeMap<String, AggregatedAircraftMetric>,
    thresholds: &HealthThresholds,
) -> Vec<HealthAssessment> {
    aircraft.values().map(|a| assess(a, thresholds)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{aircraft_metric, healthy_poll};

    #[test]
    fn test_healthy_aircraft_is_normal() {
        let assessment = assess(&aircraft_metric(healthy_poll()), &HealthThresholds::default());
        assert_eq!(assessment.severity, Severity::Normal);
        assert_eq!(assessment.breach_count, 0);
        assert_eq!(assessment.findings().count(), 0);
    }

    #[test]
    fn test_scenario_two_breaches_compound_to_critical() {
        let mut poll = healthy_poll();
        poll.engine_vibration = Some(4.2);
        poll.cabin_pressure = Some(1045.0);
        let assessment = assess(&aircraft_metric(poll), &HealthThresholds::default());

        assert_eq!(assessment.breach_count, 2);
        assert_eq!(assessment.severity, Severity::Critical);
        let fuel = &assessment.checks[2];
        assert_eq!(fuel.subsystem, Subsystem::Fuel);
        assert_eq!(fuel.status, SubsystemStatus::Nominal);
    }

    #[test]
    fn test_single_breach_is_warning() {
        let mut poll = healthy_poll();
        poll.fuel_consumption = Some(4800.0);
        let assessment = assess(&aircraft_metric(poll), &HealthThresholds::default());
        assert_eq!(assessment.severity, Severity::Warning);
    }

    #[test]
    fn test_two_breaches_in_one_subsystem_is_warning() {
        let mut poll = healthy_poll();
        poll.engine_vibration = Some(5.0);
        poll.engine_thrust = Some(70.0);
        let assessment = assess(&aircraft_metric(poll), &HealthThresholds::default());
        assert_eq!(assessment.breach_count, 1);
        assert_eq!(assessment.severity, Severity::Warning);
        assert_eq!(assessment.checks[0].findings.len(), 2);
    }

    #[test]
    fn test_marginal_reading_is_watch() {
        let mut poll = healthy_poll();
        poll.engine_vibration = Some(2.8);
        let assessment = assess(&aircraft_metric(poll), &HealthThresholds::default());
        assert_eq!(assessment.checks[0].status, SubsystemStatus::Marginal);
        assert_eq!(assessment.severity, Severity::Watch);
    }

    #[test]
    fn test_breach_alongside_missing_sensor_still_counts() {
        let mut poll = healthy_poll();
        poll.engine_vibration = Some(9.0);
        poll.engine_thrust = None;
        poll.fuel_consumption = Some(9000.0);
        let assessment = assess(&aircraft_metric(poll), &HealthThresholds::default());
        assert_eq!(assessment.checks[0].status, SubsystemStatus::SensorFailure);
        assert!(assessment.checks[0].breached);
        assert_eq!(assessment.breach_count, 2);
        assert_eq!(assessment.severity, Severity::Critical);
    }

    #[test]
    fn test_missing_reading_is_sensor_failure() {
        let mut poll = healthy_poll();
        poll.cabin_temperature = None;
        let assessment = assess(&aircraft_metric(poll), &HealthThresholds::default());
        assert_eq!(assessment.checks[1].status, SubsystemStatus::SensorFailure);
        assert_eq!(assessment.severity, Severity::Critical);

        let missing: Vec<_> = assessment.missing().collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].reading, "cabin_temperature");
        assert_eq!(missing[0].to_string(), "aircraft VT-AXB missing cabin_temperature reading");
    }
}
