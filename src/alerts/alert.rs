use crate::records::{Severity, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What kind of thing an alert is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Flight,
    Aircraft,
    Crew,
    Route,
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubjectType::Flight => "flight",
            SubjectType::Aircraft => "aircraft",
            SubjectType::Crew => "crew",
            SubjectType::Route => "route",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    pub kind: SubjectType,
    pub id: String,
}

impl Subject {
    pub fn flight(id: impl Into<String>) -> Self {
        Self { kind: SubjectType::Flight, id: id.into() }
    }

    pub fn aircraft(id: impl Into<String>) -> Self {
        Self { kind: SubjectType::Aircraft, id: id.into() }
    }

    pub fn crew(id: impl Into<String>) -> Self {
        Self { kind: SubjectType::Crew, id: id.into() }
    }

    pub fn route(id: impl Into<String>) -> Self {
        Self { kind: SubjectType::Route, id: id.into() }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Which model produced an alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Delay,
    Health,
    Crew,
    Load,
    Route,
}

impl AlertCategory {
    pub const ALL: [AlertCategory; 5] = [
        AlertCategory::Delay,
        AlertCategory::Health,
        AlertCategory::Crew,
        AlertCategory::Load,
        AlertCategory::Route,
    ];
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertCategory::Delay => "delay",
            AlertCategory::Health => "health",
            AlertCategory::Crew => "crew",
            AlertCategory::Load => "load",
            AlertCategory::Route => "route",
        };
        f.write_str(name)
    }
}

/// Deduplication key: one current alert per (subject, category)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertKey {
    pub subject: Subject,
    pub category: AlertCategory,
}

/// A classified risk signal
///
/// Value object: never mutated once created. A later cycle produces a new
/// alert for the same key instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub subject: Subject,
    pub category: AlertCategory,
    pub severity: Severity,
    /// The cycle's `as_of` time
    pub generated_at: Timestamp,
    /// Supporting numbers behind the severity
    pub metrics: BTreeMap<String, f64>,
    pub message: String,
}

impl Alert {
    pub fn key(&self) -> AlertKey {
        AlertKey {
            subject: self.subject.clone(),
            category: self.category,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} ({}): {}",
            self.severity, self.subject, self.category, self.message
        )
    }
}

/// One entry of the alert history: a new key or a severity change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertTransition {
    pub cycle: u64,
    /// Severity before this cycle, `None` for a key seen for the first time
    pub previous: Option<Severity>,
    pub alert: Alert,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_alert_display_and_key() {
        let alert = Alert {
            subject: Subject::aircraft("VT-AXB"),
            category: AlertCategory::Health,
            severity: Severity::Critical,
            generated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            metrics: BTreeMap::new(),
            message: "engine vibration 4.2 exceeds 3.0".to_string(),
        };
        assert_eq!(
            alert.to_string(),
            "[Critical] aircraft VT-AXB (health): engine vibration 4.2 exceeds 3.0"
        );
        assert_eq!(alert.key().subject, Subject::aircraft("VT-AXB"));
        assert_eq!(alert.key().category, AlertCategory::Health);
    }

    #[test]
    fn test_keys_order_by_subject_then_category() {
        let a = AlertKey { subject: Subject::flight("GA1001"), category: AlertCategory::Load };
        let b = AlertKey { subject: Subject::flight("GA1001"), category: AlertCategory::Delay };
        let c = AlertKey { subject: Subject::aircraft("VT-AXB"), category: AlertCategory::Delay };
        let mut keys = vec![a.clone(), b.clone(), c.clone()];
        keys.sort();
        assert_eq!(keys, vec![b, a, c]);
    }
}
