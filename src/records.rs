//! Core record types and enums for the flight operations risk engine
//!
//! This module defines the fundamental data structures used throughout the
//! application: the raw flight, sensor, booking, roster and route-weather
//! records delivered by the ingestion collaborator, and the ordered severity
//! tier every model is classified into.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Longest span, in hours, a duty entry or crew time window may cover
pub const MAX_SPAN_HOURS: f64 = 8760.0;

/// One logged flight leg
///
/// Immutable once logged; there is one per flight leg per day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightRecord {
    /// Flight number, e.g. "GA1001"
    pub flight_id: String,
    /// Registration of the aircraft operating the leg
    pub aircraft_id: String,
    /// Aircraft type; crew must hold this type rating
    pub aircraft_type: String,
    /// Departure airport code
    pub origin: String,
    /// Arrival airport code
    pub destination: String,
    pub scheduled_departure: Timestamp,
    pub scheduled_arrival: Timestamp,
    #[serde(default)]
    pub actual_departure: Option<Timestamp>,
    #[serde(default)]
    pub actual_arrival: Option<Timestamp>,
    /// Observed weather severity at departure (0.0 - 1.0)
    pub weather_severity: f64,
    /// Number of open maintenance items on the aircraft
    pub maintenance_issues: u32,
    /// Operational congestion level (0.0 - 1.0)
    pub congestion: f64,
    /// Number of crew positions the leg needs
    #[serde(default = "default_crew_required")]
    pub crew_required: u32,
}

fn default_crew_required() -> u32 {
    1
}

impl FlightRecord {
    /// Route identifier in `ORIGIN-DESTINATION` form
    pub fn route_id(&self) -> String {
        format!("{}-{}", self.origin, self.destination)
    }

    /// Scheduled block time in hours
    pub fn block_hours(&self) -> f64 {
        hours_between(self.scheduled_departure, self.scheduled_arrival)
    }

    /// Departure delay in minutes, if the leg has actually departed
    pub fn departure_delay_minutes(&self) -> Option<f64> {
        self.actual_departure
            .map(|actual| (actual - self.scheduled_departure).num_seconds() as f64 / 60.0)
    }

    /// Check the constraints serde cannot express
    pub fn check(&self) -> Result<(), String> {
        if self.flight_id.trim().is_empty() {
            return Err("empty flight_id".to_string());
        }
        if self.origin.trim().is_empty() || self.destination.trim().is_empty() {
            return Err("empty origin or destination".to_string());
        }
        if self.scheduled_arrival <= self.scheduled_departure {
            return Err("scheduled_arrival is not after scheduled_departure".to_string());
        }
        check_unit_interval("weather_severity", self.weather_severity)?;
        check_unit_interval("congestion", self.congestion)?;
        if self.crew_required == 0 {
            return Err("crew_required must be at least 1".to_string());
        }
        Ok(())
    }
}

/// One sensor poll of an aircraft
///
/// Superseded by the next poll rather than mutated. Readings are optional on
/// the wire: an absent reading is a sensor failure for the health monitor,
/// not a malformed record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AircraftMetric {
    pub registration: String,
    pub timestamp: Timestamp,
    /// Engine vibration in mm/s
    #[serde(default)]
    pub engine_vibration: Option<f64>,
    /// Engine thrust as a percentage of rated thrust
    #[serde(default)]
    pub engine_thrust: Option<f64>,
    /// Cabin pressure in hPa
    #[serde(default)]
    pub cabin_pressure: Option<f64>,
    /// Cabin temperature in degrees Celsius
    #[serde(default)]
    pub cabin_temperature: Option<f64>,
    /// Fuel consumption in kg/h
    #[serde(default)]
    pub fuel_consumption: Option<f64>,
}

impl AircraftMetric {
    pub fn check(&self) -> Result<(), String> {
        if self.registration.trim().is_empty() {
            return Err("empty registration".to_string());
        }
        for (name, value) in [
            ("engine_vibration", self.engine_vibration),
            ("engine_thrust", self.engine_thrust),
            ("cabin_pressure", self.cabin_pressure),
            ("cabin_temperature", self.cabin_temperature),
            ("fuel_consumption", self.fuel_consumption),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(format!("{} is not a finite number", name));
                }
            }
        }
        Ok(())
    }
}

/// A booking snapshot for one flight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRecord {
    pub flight_id: String,
    pub timestamp: Timestamp,
    /// Seats sold so far
    pub bookings: u32,
    /// Seats available on the aircraft
    pub capacity: u32,
    /// Historical no-show rate for the flight (0.0 - 1.0)
    #[serde(default)]
    pub no_show_rate: Option<f64>,
}

impl BookingRecord {
    pub fn check(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than zero".to_string());
        }
        if let Some(rate) = self.no_show_rate {
            check_unit_interval("no_show_rate", rate)?;
        }
        Ok(())
    }
}

/// One block of duty already worked or assigned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DutyEntry {
    /// Flight the duty belongs to, if any
    #[serde(default)]
    pub flight_id: Option<String>,
    pub starts_at: Timestamp,
    pub hours: f64,
}

/// A crew member and their duty-hour ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewMember {
    pub crew_id: String,
    /// Type ratings held, e.g. "A320"
    pub qualifications: BTreeSet<String>,
    /// Duty worked or assigned; rolling-window totals are derived from it
    #[serde(default)]
    pub duty_log: Vec<DutyEntry>,
    /// When the current rest period began (end of last duty)
    #[serde(default)]
    pub rest_started_at: Option<Timestamp>,
}

impl CrewMember {
    pub fn check(&self) -> Result<(), String> {
        if self.crew_id.trim().is_empty() {
            return Err("empty crew_id".to_string());
        }
        for entry in &self.duty_log {
            if !entry.hours.is_finite() || !(0.0..=MAX_SPAN_HOURS).contains(&entry.hours) {
                return Err(format!("invalid duty hours {}", entry.hours));
            }
        }
        Ok(())
    }

    pub fn is_qualified_for(&self, aircraft_type: &str) -> bool {
        self.qualifications.contains(aircraft_type)
    }

    /// Duty hours in the window of `window_hours` ending at `at`
    pub fn rolling_duty_hours(&self, at: Timestamp, window_hours: f64) -> f64 {
        let window_start = shift_hours(at, -window_hours);
        self.duty_log
            .iter()
            .filter(|entry| entry.starts_at > window_start && entry.starts_at <= at)
            .map(|entry| entry.hours)
            .sum()
    }

    /// Highest rolling-window total any window would reach if a duty of
    /// `hours` starting at `start` were added
    ///
    /// Adding the duty raises every window ending in `[start, start + window)`.
    /// Window totals only step up at entry starts, so it is enough to check
    /// `start` itself and every later entry start inside that range.
    pub fn projected_peak_hours(&self, start: Timestamp, hours: f64, window_hours: f64) -> f64 {
        let window_end = shift_hours(start, window_hours);
        let mut peak = self.rolling_duty_hours(start, window_hours) + hours;
        for entry in &self.duty_log {
            if entry.starts_at > start && entry.starts_at < window_end {
                let total = self.rolling_duty_hours(entry.starts_at, window_hours) + hours;
                if total > peak {
                    peak = total;
                }
            }
        }
        peak
    }

    /// Highest rolling-window total over the whole ledger
    pub fn peak_duty_hours(&self, window_hours: f64) -> f64 {
        self.duty_log
            .iter()
            .map(|entry| self.rolling_duty_hours(entry.starts_at, window_hours))
            .fold(0.0, f64::max)
    }

    /// Whether the member has rested at least `min_rest_hours` by `at`
    pub fn is_rested_at(&self, at: Timestamp, min_rest_hours: f64) -> bool {
        match self.rest_started_at {
            Some(rest_start) => shift_hours(rest_start, min_rest_hours) <= at,
            None => true,
        }
    }

    /// Whether a logged duty falls within `min_rest_hours` of `[start, end]`
    ///
    /// Catches roster duty that overlaps the leg or leaves too little rest on
    /// either side of it, whether or not the rest clock was set.
    pub fn has_duty_conflict(&self, start: Timestamp, end: Timestamp, min_rest_hours: f64) -> bool {
        let blocked_from = shift_hours(start, -min_rest_hours);
        let blocked_until = shift_hours(end, min_rest_hours);
        self.duty_log.iter().any(|entry| {
            let entry_end = shift_hours(entry.starts_at, entry.hours);
            entry.starts_at < blocked_until && entry_end > blocked_from
        })
    }

    /// Free to fly a leg from `start` to `end`: rested and not double-booked
    pub fn is_available_for(&self, start: Timestamp, end: Timestamp, min_rest_hours: f64) -> bool {
        self.is_rested_at(start, min_rest_hours)
            && !self.has_duty_conflict(start, end, min_rest_hours)
    }
}

/// Conditions observed at one waypoint of a route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaypointCondition {
    /// Waypoint or airport code
    pub name: String,
    pub wind_speed_kt: f64,
    pub visibility_m: f64,
    #[serde(default)]
    pub storm: bool,
}

/// Weather along a planned route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteWeather {
    /// Route identifier in `ORIGIN-DESTINATION` form
    pub route_id: String,
    /// Destination airport code, used to look up alternates
    pub destination: String,
    pub timestamp: Timestamp,
    pub waypoints: Vec<WaypointCondition>,
}

impl RouteWeather {
    pub fn check(&self) -> Result<(), String> {
        if self.route_id.trim().is_empty() {
            return Err("empty route_id".to_string());
        }
        if self.waypoints.is_empty() {
            return Err("route has no waypoints".to_string());
        }
        for waypoint in &self.waypoints {
            if !waypoint.wind_speed_kt.is_finite() || !waypoint.visibility_m.is_finite() {
                return Err(format!("waypoint {} has non-finite readings", waypoint.name));
            }
        }
        Ok(())
    }
}

/// Severity tier shared by every alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing to report
    Normal,
    /// Worth keeping an eye on
    Watch,
    /// Requires attention
    Warning,
    /// Requires immediate action
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Normal,
        Severity::Watch,
        Severity::Warning,
        Severity::Critical,
    ];
}

/// Hours between two timestamps
pub fn hours_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

/// Move a timestamp by fractional hours (second precision)
///
/// Saturates at the ends of the representable range instead of panicking.
pub fn shift_hours(at: Timestamp, hours: f64) -> Timestamp {
    const MAX_SECONDS: f64 = 1.0e15;
    let seconds = (hours * 3600.0).round();
    let seconds = if seconds.is_nan() {
        0.0
    } else {
        seconds.clamp(-MAX_SECONDS, MAX_SECONDS)
    };
    let limit = if seconds < 0.0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };
    at.checked_add_signed(Duration::seconds(seconds as i64))
        .unwrap_or(limit)
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{} {} outside 0.0..=1.0", name, value));
    }
    Ok(())
}
