//! Shared alert state
//!
//! The current state is an immutable [`AlertSnapshot`] published through an
//! [`AlertStore`]. Writers build the next snapshot off to the side and swap it
//! in whole, so a reader always holds one complete cycle's view.

use crate::alerts::{Alert, AlertCategory, AlertKey, AlertTransition, Subject};
use crate::error::DataError;
use crate::models::{Assignment, CrewDutyStatus};
use crate::records::{Severity, Timestamp};
use arc_swap::ArcSwap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Alert counts per severity and per category
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertSummary {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<AlertCategory, usize>,
}

/// Complete, consistent alert state as of one cycle
#[derive(Debug, Clone, Default)]
pub struct AlertSnapshot {
    cycle: u64,
    as_of: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    alerts: BTreeMap<AlertKey, Alert>,
    /// Cycle in which each alert was last produced
    refreshed: BTreeMap<AlertKey, u64>,
    history: VecDeque<AlertTransition>,
    assignments: Vec<Assignment>,
    crew: Vec<CrewDutyStatus>,
    data_errors: Vec<DataError>,
}

impl AlertSnapshot {
    /// Start the snapshot for the next cycle from this one
    ///
    /// Alerts and history carry over; per-cycle data (crew view, data
    /// errors) starts empty.
    pub fn successor(&self, cycle: u64, as_of: Timestamp) -> Self {
        Self {
            cycle,
            as_of: Some(as_of),
            completed_at: None,
            alerts: self.alerts.clone(),
            refreshed: self.refreshed.clone(),
            history: self.history.clone(),
            assignments: self.assignments.clone(),
            crew: Vec::new(),
            data_errors: Vec::new(),
        }
    }

    /// Merge one cycle's alerts, replacing any prior alert with the same key
    ///
    /// A key seen for the first time or whose severity changed is appended to
    /// the history, which is trimmed from the oldest end to `history_limit`.
    ///
    /// # Returns
    ///
    /// The number of history transitions recorded.
    pub fn merge_alerts(&mut self, alerts: Vec<Alert>, history_limit: usize) -> usize {
        let mut transitions = 0;
        for alert in alerts {
            let key = alert.key();
            let previous = self.alerts.get(&key).map(|a| a.severity);
            if previous != Some(alert.severity) {
                self.history.push_back(AlertTransition {
                    cycle: self.cycle,
                    previous,
                    alert: alert.clone(),
                });
                transitions += 1;
            }
            self.refreshed.insert(key.clone(), self.cycle);
            self.alerts.insert(key, alert);
        }

        while self.history.len() > history_limit {
            self.history.pop_front();
        }
        debug!(
            "Merged alerts for cycle {}: {} transitions, {} current alerts",
            self.cycle,
            transitions,
            self.alerts.len()
        );
        transitions
    }

    /// Drop alerts not produced for more than `retention_cycles` cycles
    ///
    /// # Returns
    ///
    /// The number of alerts retired.
    pub fn retire_stale(&mut self, retention_cycles: u64) -> usize {
        let cycle = self.cycle;
        let stale: Vec<AlertKey> = self
            .refreshed
            .iter()
            .filter(|(_, seen)| cycle.saturating_sub(**seen) > retention_cycles)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.refreshed.remove(key);
            self.alerts.remove(key);
        }
        if !stale.is_empty() {
            debug!("Retired {} stale alerts in cycle {}", stale.len(), cycle);
        }
        stale.len()
    }

    pub fn set_assignments(&mut self, assignments: Vec<Assignment>) {
        self.assignments = assignments;
    }

    pub fn set_crew(&mut self, crew: Vec<CrewDutyStatus>) {
        self.crew = crew;
    }

    pub fn set_data_errors(&mut self, errors: Vec<DataError>) {
        self.data_errors = errors;
    }

    pub fn complete(&mut self, at: Timestamp) {
        self.completed_at = Some(at);
    }

    /// Cycle number, 0 before the first cycle
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn as_of(&self) -> Option<Timestamp> {
        self.as_of
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn get(&self, key: &AlertKey) -> Option<&Alert> {
        self.alerts.get(key)
    }

    /// Every current alert, in key order
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.values()
    }

    pub fn alert_map(&self) -> &BTreeMap<AlertKey, Alert> {
        &self.alerts
    }

    /// Alerts whose subject id matches, across subject types
    ///
    /// A flight number, registration, crew id or route id all work.
    pub fn for_subject(&self, id: &str) -> Vec<&Alert> {
        self.alerts.values().filter(|a| a.subject.id == id).collect()
    }

    /// Alerts at or above a severity, worst first
    pub fn at_least(&self, severity: Severity) -> Vec<&Alert> {
        let mut alerts: Vec<&Alert> = self
            .alerts
            .values()
            .filter(|a| a.severity >= severity)
            .collect();
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
        alerts
    }

    pub fn by_category(&self, category: AlertCategory) -> Vec<&Alert> {
        self.alerts
            .values()
            .filter(|a| a.category == category)
            .collect()
    }

    pub fn history(&self) -> impl Iterator<Item = &AlertTransition> {
        self.history.iter()
    }

    pub fn history_for(&self, subject: &Subject) -> Vec<&AlertTransition> {
        self.history
            .iter()
            .filter(|t| &t.alert.subject == subject)
            .collect()
    }

    pub fn summary(&self) -> AlertSummary {
        let mut summary = AlertSummary {
            total: self.alerts.len(),
            ..AlertSummary::default()
        };
        for alert in self.alerts.values() {
            *summary.by_severity.entry(alert.severity).or_insert(0) += 1;
            *summary.by_category.entry(alert.category).or_insert(0) += 1;
        }
        summary
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn crew(&self) -> &[CrewDutyStatus] {
        &self.crew
    }

    pub fn data_errors(&self) -> &[DataError] {
        &self.data_errors
    }
}

/// Atomically swappable holder of the current snapshot
#[derive(Debug)]
pub struct AlertStore {
    current: ArcSwap<AlertSnapshot>,
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(AlertSnapshot::default()),
        }
    }

    /// The latest complete snapshot
    pub fn load(&self) -> Arc<AlertSnapshot> {
        self.current.load_full()
    }

    /// Make a finished snapshot visible to readers
    pub fn publish(&self, snapshot: AlertSnapshot) -> Arc<AlertSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }
}
