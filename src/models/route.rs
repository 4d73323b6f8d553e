//! Route weather checks and diversion suggestions

use crate::aggregator::AggregatedFlightMetric;
use crate::config::RouteThresholds;
use crate::records::{RouteWeather, Severity, WaypointCondition};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A diversion airport for some destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alternate {
    pub code: String,
    pub distance_nm: f64,
}

/// Source of diversion alternates per destination airport
pub trait AlternateLookup: Send + Sync {
    fn alternates(&self, destination: &str) -> Vec<Alternate>;
}

/// Static destination-to-alternates table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AlternateTable(BTreeMap<String, Vec<Alternate>>);

impl AlternateTable {
    pub fn new(entries: BTreeMap<String, Vec<Alternate>>) -> Self {
        Self(entries)
    }

    pub fn for_destination(&self, destination: &str) -> &[Alternate] {
        self.0.get(destination).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (destination, alternates) in &self.0 {
            for alternate in alternates {
                if alternate.code.trim().is_empty() {
                    errors.push(format!("alternates.{} has an empty code", destination));
                }
                if !alternate.distance_nm.is_finite() || alternate.distance_nm < 0.0 {
                    errors.push(format!(
                        "alternates.{}: distance to {} must be >= 0, got {}",
                        destination, alternate.code, alternate.distance_nm
                    ));
                }
            }
        }
        errors
    }
}

impl Default for AlternateTable {
    fn default() -> Self {
        let table: &[(&str, &[(&str, f64)])] = &[
            ("DEL", &[("ATQ", 240.0), ("AMD", 420.0)]),
            ("BOM", &[("PNQ", 65.0), ("GOI", 230.0)]),
            ("BLR", &[("MAA", 155.0), ("HYD", 270.0)]),
            ("MAA", &[("BLR", 155.0), ("HYD", 275.0)]),
            ("HYD", &[("BLR", 270.0), ("GOI", 300.0)]),
            ("CCU", &[("PAT", 260.0), ("GAU", 280.0)]),
            ("DXB", &[("AUH", 60.0), ("DOH", 205.0)]),
            ("LHR", &[("LGW", 25.0), ("MAN", 130.0)]),
            ("JFK", &[("EWR", 15.0), ("BOS", 160.0)]),
            ("SIN", &[("KUL", 160.0), ("CGK", 480.0)]),
        ];
        Self(
            table
                .iter()
                .map(|(destination, alternates)| {
                    let alternates = alternates
                        .iter()
                        .map(|(code, distance_nm)| Alternate {
                            code: code.to_string(),
                            distance_nm: *distance_nm,
                        })
                        .collect();
                    (destination.to_string(), alternates)
                })
                .collect(),
        )
    }
}

impl AlternateLookup for AlternateTable {
    fn alternates(&self, destination: &str) -> Vec<Alternate> {
        self.for_destination(destination).to_vec()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum WaypointStatus {
    Clear,
    Marginal,
    Breach,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaypointCheck {
    pub name: String,
    pub status: WaypointStatus,
    pub storm: bool,
    pub reasons: Vec<String>,
}

pub fn check_waypoint(waypoint: &WaypointCondition, t: &RouteThresholds) -> WaypointCheck {
    let mut reasons = Vec::new();
    if waypoint.wind_speed_kt > t.wind_speed_max_kt {
        reasons.push(format!(
            "wind {:.0} kt exceeds {:.0} kt",
            waypoint.wind_speed_kt, t.wind_speed_max_kt
        ));
    }
    if waypoint.visibility_m < t.visibility_min_m {
        reasons.push(format!(
            "visibility {:.0} m below {:.0} m",
            waypoint.visibility_m, t.visibility_min_m
        ));
    }
    if waypoint.storm {
        reasons.push("thunderstorm activity".to_string());
    }

    let status = if !reasons.is_empty() {
        WaypointStatus::Breach
    } else if waypoint.wind_speed_kt >= t.wind_speed_max_kt * t.watch_ratio {
        reasons.push(format!(
            "wind {:.0} kt near limit {:.0} kt",
            waypoint.wind_speed_kt, t.wind_speed_max_kt
        ));
        WaypointStatus::Marginal
    } else {
        WaypointStatus::Clear
    };

    WaypointCheck {
        name: waypoint.name.clone(),
        status,
        storm: waypoint.storm,
        reasons,
    }
}

/// Route risk, ordered from best to worst
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RouteRisk {
    Clear,
    Advisory,
    Hazardous,
    Severe,
}

impl RouteRisk {
    pub fn severity(self) -> Severity {
        match self {
            RouteRisk::Clear => Severity::Normal,
            RouteRisk::Advisory => Severity::Watch,
            RouteRisk::Hazardous => Severity::Warning,
            RouteRisk::Severe => Severity::Critical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteAssessment {
    pub route_id: String,
    pub destination: String,
    pub risk: RouteRisk,
    pub waypoints: Vec<WaypointCheck>,
    pub breach_count: usize,
    pub max_wind_kt: f64,
    pub min_visibility_m: f64,
    pub diversion: Option<Alternate>,
    /// Flights currently flying this route
    pub affected_flights: Vec<String>,
}

/// Names of every breaching waypoint across all routes of the cycle
pub fn breaching_sites<'a>(
    routes: impl IntoIterator<Item = &'a RouteWeather>,
    t: &RouteThresholds,
) -> BTreeSet<String> {
    routes
        .into_iter()
        .flat_map(|r| r.waypoints.iter())
        .filter(|w| check_waypoint(w, t).status == WaypointStatus::Breach)
        .map(|w| w.name.clone())
        .collect()
}

/// Nearest alternate for `destination` that is not itself a breaching site
pub fn suggest_diversion(
    destination: &str,
    lookup: &dyn AlternateLookup,
    unsafe_sites: &BTreeSet<String>,
) -> Option<Alternate> {
    lookup
        .alternates(destination)
        .into_iter()
        .filter(|a| !unsafe_sites.contains(&a.code))
        .min_by(|a, b| {
            a.distance_nm
                .total_cmp(&b.distance_nm)
                .then_with(|| a.code.cmp(&b.code))
        })
}

pub fn assess(
    route: &RouteWeather,
    t: &RouteThresholds,
    lookup: &dyn AlternateLookup,
    unsafe_sites: &BTreeSet<String>,
    flights: &BTreeMap<String, AggregatedFlightMetric>,
) -> RouteAssessment {
    let waypoints: Vec<WaypointCheck> = route
        .waypoints
        .iter()
        .map(|w| check_waypoint(w, t))
        .collect();

    let breach_count = waypoints
        .iter()
        .filter(|w| w.status == WaypointStatus::Breach)
        .count();
    let storm = waypoints.iter().any(|w| w.storm);
    let risk = if breach_count >= 2 || storm {
        RouteRisk::Severe
    } else if breach_count == 1 {
        RouteRisk::Hazardous
    } else if waypoints.iter().any(|w| w.status == WaypointStatus::Marginal) {
        RouteRisk::Advisory
    } else {
        RouteRisk::Clear
    };

    let diversion = if breach_count > 0 {
        let suggestion = suggest_diversion(&route.destination, lookup, unsafe_sites);
        if suggestion.is_none() {
            debug!("No safe alternate for {} on {}", route.destination, route.route_id);
        }
        suggestion
    } else {
        None
    };

    RouteAssessment {
        route_id: route.route_id.clone(),
        destination: route.destination.clone(),
        risk,
        breach_count,
        max_wind_kt: route
            .waypoints
            .iter()
            .map(|w| w.wind_speed_kt)
            .fold(0.0, f64::max),
        min_visibility_m: route
            .waypoints
            .iter()
            .map(|w| w.visibility_m)
            .fold(f64::INFINITY, f64::min),
        waypoints,
        diversion,
        affected_flights: flights
            .values()
            .filter(|f| f.route_id() == route.route_id)
            .map(|f| f.flight_id.clone())
            .collect(),
    }
}

pub fn assess_all(
    routes: &BTreeMap<String, RouteWeather>,
    flights: &BTreeMap<String, AggregatedFlightMetric>,
    t: &RouteThresholds,
    lookup: &dyn AlternateLookup,
) -> Vec<RouteAssessment> {
    let unsafe_sites = breaching_sites(routes.values(), t);
    routes
        .values()
        .map(|r| assess(r, t, lookup, &unsafe_sites, flights))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{flight_metric, route_weather, waypoint};

    #[test]
    fn test_waypoint_statuses() {
        let t = RouteThresholds::default();
        assert_eq!(check_waypoint(&waypoint("A", 20.0, 8000.0, false), &t).status, WaypointStatus::Clear);
        assert_eq!(check_waypoint(&waypoint("A", 32.0, 8000.0, false), &t).status, WaypointStatus::Marginal);
        assert_eq!(check_waypoint(&waypoint("A", 41.0, 8000.0, false), &t).status, WaypointStatus::Breach);
        assert_eq!(check_waypoint(&waypoint("A", 10.0, 1200.0, false), &t).status, WaypointStatus::Breach);
        assert_eq!(check_waypoint(&waypoint("A", 10.0, 8000.0, true), &t).status, WaypointStatus::Breach);
    }

    #[test]
    fn test_single_breach_is_hazardous_with_diversion() {
        let route = route_weather(
            "DEL-BOM",
            "BOM",
            vec![waypoint("DEL", 10.0, 8000.0, false), waypoint("BOM", 45.0, 6000.0, false)],
        );
        let sites = breaching_sites([&route], &RouteThresholds::default());
        let a = assess(&route, &RouteThresholds::default(), &AlternateTable::default(), &sites, &BTreeMap::new());

        assert_eq!(a.risk, RouteRisk::Hazardous);
        assert_eq!(a.risk.severity(), Severity::Warning);
        assert_eq!(a.diversion.map(|d| d.code), Some("PNQ".to_string()));
        assert_eq!(a.max_wind_kt, 45.0);
    }

    #[test]
    fn test_storm_is_severe() {
        let route = route_weather("DEL-BOM", "BOM", vec![waypoint("IGARI", 15.0, 9000.0, true)]);
        let sites = BTreeSet::new();
        let a = assess(&route, &RouteThresholds::default(), &AlternateTable::default(), &sites, &BTreeMap::new());
        assert_eq!(a.risk, RouteRisk::Severe);
        assert_eq!(a.breach_count, 1);
    }

    #[test]
    fn test_breaching_alternate_is_skipped() {
        let t = RouteThresholds::default();
        let to_bom = route_weather("DEL-BOM", "BOM", vec![waypoint("BOM", 50.0, 9000.0, false)]);
        let to_pnq = route_weather("DEL-PNQ", "PNQ", vec![waypoint("PNQ", 10.0, 800.0, false)]);
        let sites = breaching_sites([&to_bom, &to_pnq], &t);

        let a = assess(&to_bom, &t, &AlternateTable::default(), &sites, &BTreeMap::new());
        assert_eq!(a.diversion.map(|d| d.code), Some("GOI".to_string()));
    }

    #[test]
    fn test_no_safe_alternate_means_no_suggestion() {
        let t = RouteThresholds::default();
        let route = route_weather("DEL-XYZ", "XYZ", vec![waypoint("XYZ", 50.0, 9000.0, false)]);
        let sites = breaching_sites([&route], &t);
        let a = assess(&route, &t, &AlternateTable::default(), &sites, &BTreeMap::new());
        assert!(a.diversion.is_none());
        assert_eq!(a.risk, RouteRisk::Hazardous);
    }

    #[test]
    fn test_clear_route_lists_affected_flights() {
        let mut flights = BTreeMap::new();
        flights.insert("GA1001".to_string(), flight_metric("GA1001", 0.1, 0, 0.1));
        let route = route_weather("DEL-BOM", "BOM", vec![waypoint("BOM", 5.0, 9000.0, false)]);

        let assessments = assess_all(
            &[("DEL-BOM".to_string(), route)].into_iter().collect(),
            &flights,
            &RouteThresholds::default(),
            &AlternateTable::default(),
        );
        assert_eq!(assessments[0].risk, RouteRisk::Clear);
        assert!(assessments[0].diversion.is_none());
        assert_eq!(assessments[0].affected_flights, vec!["GA1001".to_string()]);
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = AlternateTable::default();
        assert!(table.problems().is_empty());
        assert_eq!(table.for_destination("LHR").len(), 2);
        assert!(table.for_destination("ZZZ").is_empty());
    }
}
