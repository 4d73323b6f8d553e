use crate::alerts::{Alert, AlertCategory, Subject};
use crate::models::{
    Assignment, ComplianceFinding, CrewShortage, DelayAssessment, HealthAssessment,
    LoadAssessment, RouteAssessment,
};
use crate::records::{Severity, Timestamp};
use std::collections::BTreeMap;

/// Common shape of every model output that can become an alert
pub trait RiskSignal {
    /// What the signal is about
    fn subject(&self) -> Subject;

    /// Which model produced it
    fn category(&self) -> AlertCategory;

    /// Severity tier of the signal
    fn severity(&self) -> Severity;

    /// Supporting numbers
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Human-readable summary
    fn message(&self) -> String;
}

/// Normalizes model outputs into alerts stamped with the cycle time
#[derive(Debug, Clone, Copy)]
pub struct AlertClassifier {
    generated_at: Timestamp,
}

impl AlertClassifier {
    pub fn new(generated_at: Timestamp) -> Self {
        Self { generated_at }
    }

    pub fn classify(&self, signal: &dyn RiskSignal) -> Alert {
        Alert {
            subject: signal.subject(),
            category: signal.category(),
            severity: signal.severity(),
            generated_at: self.generated_at,
            metrics: signal.metrics(),
            message: signal.message(),
        }
    }

    pub fn classify_all<'a>(&self, signals: impl IntoIterator<Item = &'a dyn RiskSignal>) -> Vec<Alert> {
        signals.into_iter().map(|s| self.classify(s)).collect()
    }
}

fn metric_map<const N: usize>(entries: [(&str, f64); N]) -> BTreeMap<String, f64> {
    entries
        .into_iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

impl RiskSignal for DelayAssessment {
    fn subject(&self) -> Subject {
        Subject::flight(&self.flight_id)
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Delay
    }

    fn severity(&self) -> Severity {
        self.category.severity()
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = metric_map([
            ("score", self.score),
            ("weather_score", self.sub_scores.weather),
            ("maintenance_score", self.sub_scores.maintenance),
            ("congestion_score", self.sub_scores.congestion),
            ("expected_delay_minutes", self.expected_delay_minutes),
        ]);
        if let Some(observed) = self.observed_delay_minutes {
            metrics.insert("observed_delay_minutes".to_string(), observed);
        }
        metrics
    }

    fn message(&self) -> String {
        format!(
            "{} risk on {} (score {:.2}, {:?}-driven, about {:.0} min)",
            self.category.label(),
            self.route_id,
            self.score,
            self.dominant_factor,
            self.expected_delay_minutes
        )
    }
}

impl RiskSignal for HealthAssessment {
    fn subject(&self) -> Subject {
        Subject::aircraft(&self.registration)
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Health
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.readings.clone();
        metrics.insert("breach_count".to_string(), self.breach_count as f64);
        metrics.insert("sample_count".to_string(), self.sample_count as f64);
        if let Some(peak) = self.peak_vibration {
            metrics.insert("peak_vibration".to_string(), peak);
        }
        if let Some(mean) = self.mean_fuel_consumption {
            metrics.insert("mean_fuel_consumption".to_string(), mean);
        }
        metrics
    }

    fn message(&self) -> String {
        let findings: Vec<&str> = self.findings().collect();
        if findings.is_empty() {
            "all subsystems nominal".to_string()
        } else {
            findings.join("; ")
        }
    }
}

impl RiskSignal for LoadAssessment {
    fn subject(&self) -> Subject {
        Subject::flight(&self.flight_id)
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Load
    }

    fn severity(&self) -> Severity {
        self.category.severity()
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        metric_map([
            ("projected_load_factor", self.projected_load_factor),
            ("bookings", self.bookings as f64),
            ("capacity", self.capacity as f64),
            ("trend", self.trend),
            ("no_show_rate", self.no_show_rate),
        ])
    }

    fn message(&self) -> String {
        let risk = if self.overbooking_risk { ", overbooking risk" } else { "" };
        format!(
            "{:?} load: {:.0}% projected ({} of {} seats booked){}",
            self.category,
            self.projected_load_factor * 100.0,
            self.bookings,
            self.capacity,
            risk
        )
    }
}

impl RiskSignal for RouteAssessment {
    fn subject(&self) -> Subject {
        Subject::route(&self.route_id)
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Route
    }

    fn severity(&self) -> Severity {
        self.risk.severity()
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = metric_map([
            ("breach_count", self.breach_count as f64),
            ("max_wind_kt", self.max_wind_kt),
            ("min_visibility_m", self.min_visibility_m),
            ("affected_flights", self.affected_flights.len() as f64),
        ]);
        if let Some(diversion) = &self.diversion {
            metrics.insert("diversion_distance_nm".to_string(), diversion.distance_nm);
        }
        metrics
    }

    fn message(&self) -> String {
        let reasons: Vec<String> = self
            .waypoints
            .iter()
            .filter(|w| !w.reasons.is_empty())
            .map(|w| format!("{}: {}", w.name, w.reasons.join(", ")))
            .collect();
        let mut message = if reasons.is_empty() {
            format!("{:?}: route weather within limits", self.risk)
        } else {
            format!("{:?}: {}", self.risk, reasons.join("; "))
        };
        if self.breach_count > 0 {
            match &self.diversion {
                Some(alt) => message.push_str(&format!(
                    "; divert to {} ({:.0} nm)",
                    alt.code, alt.distance_nm
                )),
                None => message.push_str("; no safe alternate"),
            }
        }
        message
    }
}

impl RiskSignal for CrewShortage {
    fn subject(&self) -> Subject {
        Subject::flight(&self.infeasible.flight_id)
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Crew
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        metric_map([
            ("required", self.infeasible.required as f64),
            ("assigned", self.infeasible.assigned as f64),
            ("duty_hours", self.duty_hours),
            ("qualified_candidates", self.qualified_candidates as f64),
        ])
    }

    fn message(&self) -> String {
        format!("crew shortage: {} ({} rating)", self.infeasible, self.aircraft_type)
    }
}

/// A crewed flight clears any earlier shortage on it
impl RiskSignal for Assignment {
    fn subject(&self) -> Subject {
        Subject::flight(&self.flight_id)
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Crew
    }

    fn severity(&self) -> Severity {
        Severity::Normal
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        metric_map([
            ("assigned", self.crew_ids.len() as f64),
            ("duty_hours", self.duty_hours),
        ])
    }

    fn message(&self) -> String {
        format!("crewed by {}", self.crew_ids.join(", "))
    }
}

impl RiskSignal for ComplianceFinding {
    fn subject(&self) -> Subject {
        Subject::crew(&self.crew_id)
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Crew
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        metric_map([
            ("peak_duty_hours", self.peak_duty_hours),
            ("max_duty_hours", self.max_duty_hours),
        ])
    }

    fn message(&self) -> String {
        let standing = match self.severity {
            Severity::Critical => "over",
            Severity::Normal => "within",
            _ => "near",
        };
        format!(
            "{:.1} duty hours in the rolling window, {} the {:.0} h limit",
            self.peak_duty_hours, standing, self.max_duty_hours
        )
    }
}
