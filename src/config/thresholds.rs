//! Threshold configuration for the scoring models
//!
//! Every model reads its boundaries from a [`ThresholdConfig`]. The values in
//! the `Default` impls are illustrative operating defaults; a configuration
//! file must spell out every threshold of every section it declares.

use crate::records::MAX_SPAN_HOURS;
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that weights sum to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Named numeric boundaries for every model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThresholdConfig {
    pub delay: DelayThresholds,
    pub health: HealthThresholds,
    pub crew: CrewThresholds,
    pub load: LoadThresholds,
    pub route: RouteThresholds,
}

/// Weights of the three delay sub-scores; must sum to 1.0
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelayWeights {
    pub weather: f64,
    pub maintenance: f64,
    pub congestion: f64,
}

impl DelayWeights {
    pub fn sum(&self) -> f64 {
        self.weather + self.maintenance + self.congestion
    }
}

impl Default for DelayWeights {
    fn default() -> Self {
        Self {
            weather: 0.6,
            maintenance: 0.3,
            congestion: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelayThresholds {
    /// Scores at or above this are at least "minor"
    pub minor_from: f64,
    /// Scores at or above this are at least "moderate"
    pub moderate_from: f64,
    /// Scores at or above this are "severe"
    pub severe_from: f64,
    /// Open maintenance items that saturate the maintenance sub-score
    pub maintenance_issue_ceiling: f64,
    /// Delay in minutes that a score of 1.0 corresponds to
    pub delay_horizon_minutes: f64,
    pub weights: DelayWeights,
}

impl Default for DelayThresholds {
    fn default() -> Self {
        Self {
            minor_from: 0.2,
            moderate_from: 0.5,
            severe_from: 0.8,
            maintenance_issue_ceiling: 3.0,
            delay_horizon_minutes: 180.0,
            weights: DelayWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthThresholds {
    /// Engine vibration ceiling in mm/s
    pub vibration_ceiling: f64,
    /// Largest tolerated deviation from 100% rated thrust, in percent
    pub thrust_deviation_max: f64,
    /// Cabin pressure band in hPa
    pub cabin_pressure_floor: f64,
    pub cabin_pressure_ceiling: f64,
    /// Cabin temperature ceiling in degrees Celsius
    pub cabin_temperature_ceiling: f64,
    /// Fuel consumption ceiling in kg/h
    pub fuel_consumption_ceiling: f64,
    /// Fraction of a ceiling at which a reading becomes marginal
    pub watch_ratio: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            vibration_ceiling: 3.0,
            thrust_deviation_max: 20.0,
            cabin_pressure_floor: 750.0,
            cabin_pressure_ceiling: 1030.0,
            cabin_temperature_ceiling: 30.0,
            fuel_consumption_ceiling: 4500.0,
            watch_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewThresholds {
    /// Maximum duty hours inside the rolling window
    pub max_duty_hours: f64,
    /// Length of the rolling compliance window in hours
    pub rolling_window_hours: f64,
    /// Minimum rest between duties in hours
    pub min_rest_hours: f64,
    /// Fraction of the maximum at which a member is flagged as near the limit
    pub near_limit_ratio: f64,
}

impl Default for CrewThresholds {
    fn default() -> Self {
        Self {
            max_duty_hours: 60.0,
            rolling_window_hours: 168.0,
            min_rest_hours: 10.0,
            near_limit_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadThresholds {
    /// Projected load factors below this are "low"
    pub low_load_ceiling: f64,
    /// Projected load factors at or above this are "high"
    pub high_load_floor: f64,
    /// Projected load factors above this are "overbooked"
    pub overbooking_ceiling: f64,
    /// No-show rate used when a booking carries none
    pub default_no_show_rate: f64,
}

impl Default for LoadThresholds {
    fn default() -> Self {
        Self {
            low_load_ceiling: 0.4,
            high_load_floor: 0.9,
            overbooking_ceiling: 1.0,
            default_no_show_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteThresholds {
    /// Wind speed above which a waypoint breaches, in knots
    pub wind_speed_max_kt: f64,
    /// Visibility below which a waypoint breaches, in meters
    pub visibility_min_m: f64,
    /// Fraction of the wind limit at which a waypoint becomes marginal
    pub watch_ratio: f64,
}

impl Default for RouteThresholds {
    fn default() -> Self {
        Self {
            wind_speed_max_kt: 40.0,
            visibility_min_m: 1500.0,
            watch_ratio: 0.8,
        }
    }
}

impl ThresholdConfig {
    /// Validate every section, collecting all problems
    ///
    /// Returns the list of problems found; an empty list means the
    /// configuration is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let d = &self.delay;
        let w = &d.weights;
        for (name, value) in [
            ("delay.weights.weather", w.weather),
            ("delay.weights.maintenance", w.maintenance),
            ("delay.weights.congestion", w.congestion),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!("delay.weights must sum to 1.0, got {:.6}", w.sum()));
        }
        if !(0.0 < d.minor_from && d.minor_from < d.moderate_from && d.moderate_from < d.severe_from && d.severe_from <= 1.0)
        {
            errors.push(format!(
                "delay boundaries must satisfy 0 < minor_from < moderate_from < severe_from <= 1, got {} / {} / {}",
                d.minor_from, d.moderate_from, d.severe_from
            ));
        }
        check_positive("delay.maintenance_issue_ceiling", d.maintenance_issue_ceiling, &mut errors);
        check_positive("delay.delay_horizon_minutes", d.delay_horizon_minutes, &mut errors);

        let h = &self.health;
        check_positive("health.vibration_ceiling", h.vibration_ceiling, &mut errors);
        check_positive("health.thrust_deviation_max", h.thrust_deviation_max, &mut errors);
        check_positive("health.cabin_pressure_floor", h.cabin_pressure_floor, &mut errors);
        check_positive("health.cabin_temperature_ceiling", h.cabin_temperature_ceiling, &mut errors);
        check_positive("health.fuel_consumption_ceiling", h.fuel_consumption_ceiling, &mut errors);
        if h.cabin_pressure_ceiling <= h.cabin_pressure_floor {
            errors.push(format!(
                "health.cabin_pressure_ceiling ({}) must be greater than cabin_pressure_floor ({})",
                h.cabin_pressure_ceiling, h.cabin_pressure_floor
            ));
        }
        check_ratio("health.watch_ratio", h.watch_ratio, &mut errors);

        let c = &self.crew;
        check_positive("crew.max_duty_hours", c.max_duty_hours, &mut errors);
        if !(c.rolling_window_hours > 0.0 && c.rolling_window_hours <= MAX_SPAN_HOURS) {
            errors.push(format!(
                "crew.rolling_window_hours must be in (0, {}], got {}",
                MAX_SPAN_HOURS, c.rolling_window_hours
            ));
        }
        if !(0.0..=MAX_SPAN_HOURS).contains(&c.min_rest_hours) {
            errors.push(format!(
                "crew.min_rest_hours must be in [0, {}], got {}",
                MAX_SPAN_HOURS, c.min_rest_hours
            ));
        }
        check_ratio("crew.near_limit_ratio", c.near_limit_ratio, &mut errors);

        let l = &self.load;
        if !(0.0 <= l.low_load_ceiling
            && l.low_load_ceiling < l.high_load_floor
            && l.high_load_floor <= l.overbooking_ceiling)
        {
            errors.push(format!(
                "load boundaries must satisfy 0 <= low_load_ceiling < high_load_floor <= overbooking_ceiling, got {} / {} / {}",
                l.low_load_ceiling, l.high_load_floor, l.overbooking_ceiling
            ));
        }
        if !(0.0..1.0).contains(&l.default_no_show_rate) {
            errors.push(format!(
                "load.default_no_show_rate must be in 0.0..1.0, got {}",
                l.default_no_show_rate
            ));
        }

        let r = &self.route;
        check_positive("route.wind_speed_max_kt", r.wind_speed_max_kt, &mut errors);
        check_positive("route.visibility_min_m", r.visibility_min_m, &mut errors);
        check_ratio("route.watch_ratio", r.watch_ratio, &mut errors);

        errors
    }
}

fn check_positive(name: &str, value: f64, errors: &mut Vec<String>) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(format!("{} must be > 0, got {}", name, value));
    }
}

fn check_ratio(name: &str, value: f64, errors: &mut Vec<String>) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(format!("{} must be in (0, 1], got {}", name, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ThresholdConfig::default().problems().is_empty());
    }

    #[test]
    fn test_weights_not_summing_to_one_rejected() {
        let mut config = ThresholdConfig::default();
        config.delay.weights.congestion = 0.2;
        let problems = config.problems();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("sum to 1.0"));
    }

    #[test]
    fn test_negative_weight_rejected_even_if_sum_is_one() {
        let mut config = ThresholdConfig::default();
        config.delay.weights = DelayWeights {
            weather: 1.2,
            maintenance: -0.3,
            congestion: 0.1,
        };
        assert!(config
            .problems()
            .iter()
            .any(|p| p.contains("delay.weights.maintenance")));
    }

    #[test]
    fn test_unordered_delay_boundaries_rejected() {
        let mut config = ThresholdConfig::default();
        config.delay.moderate_from = 0.9;
        assert!(config.problems().iter().any(|p| p.contains("delay boundaries")));
    }

    #[test]
    fn test_inverted_cabin_band_rejected() {
        let mut config = ThresholdConfig::default();
        config.health.cabin_pressure_ceiling = 700.0;
        assert!(config
            .problems()
            .iter()
            .any(|p| p.contains("cabin_pressure_ceiling")));
    }

    #[test]
    fn test_crew_spans_beyond_a_year_rejected() {
        let mut config = ThresholdConfig::default();
        config.crew.rolling_window_hours = 1e10;
        config.crew.min_rest_hours = 9000.0;
        let problems = config.problems();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("crew.rolling_window_hours"));
        assert!(problems[1].contains("crew.min_rest_hours"));

        config.crew.rolling_window_hours = f64::NAN;
        config.crew.min_rest_hours = f64::INFINITY;
        assert_eq!(config.problems().len(), 2);

        config.crew.rolling_window_hours = MAX_SPAN_HOURS;
        config.crew.min_rest_hours = 0.0;
        assert!(config.problems().is_empty());
    }

    #[test]
    fn test_multiple_problems_collected() {
        let mut config = ThresholdConfig::default();
        config.crew.max_duty_hours = 0.0;
        config.route.watch_ratio = 1.5;
        config.load.default_no_show_rate = 1.0;
        assert_eq!(config.problems().len(), 3);
    }
}
