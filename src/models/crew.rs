//! Crew assignment against the duty-hour ledger
//!
//! The only model with state: assignments are written into a [`DutyLedger`]
//! that persists across cycles. Each flight is committed as a single
//! transaction so a flight that cannot be fully crewed leaves every member
//! untouched.

use crate::aggregator::AggregatedFlightMetric;
use crate::config::CrewThresholds;
use crate::error::AssignmentInfeasible;
use crate::records::{shift_hours, CrewMember, DutyEntry, Severity, Timestamp};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One crewed flight leg
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub flight_id: String,
    pub aircraft_type: String,
    pub scheduled_departure: Timestamp,
    pub scheduled_arrival: Timestamp,
    pub duty_hours: f64,
    pub crew_ids: Vec<String>,
}

/// A flight that could not be fully crewed this cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewShortage {
    pub infeasible: AssignmentInfeasible,
    pub aircraft_type: String,
    pub scheduled_departure: Timestamp,
    pub duty_hours: f64,
    /// Members holding the type rating, whether or not they were eligible
    pub qualified_candidates: usize,
}

/// Where a member stands against the rolling duty-hour limit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceFinding {
    pub crew_id: String,
    pub peak_duty_hours: f64,
    pub max_duty_hours: f64,
    pub severity: Severity,
}

/// Read-only duty summary for one member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewDutyStatus {
    pub crew_id: String,
    pub qualifications: Vec<String>,
    pub rolling_duty_hours: f64,
    pub peak_duty_hours: f64,
    pub rest_started_at: Option<Timestamp>,
    pub assigned_flights: Vec<String>,
}

/// Outcome of one assignment pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CrewPlan {
    /// Flights crewed during this pass
    pub assignments: Vec<Assignment>,
    pub shortages: Vec<CrewShortage>,
    pub compliance: Vec<ComplianceFinding>,
}

/// Crew pool plus the assignments still inside the retention horizon
#[derive(Debug, Clone, Default)]
pub struct DutyLedger {
    members: BTreeMap<String, CrewMember>,
    assignments: BTreeMap<(String, Timestamp), Assignment>,
}

impl DutyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(&self, crew_id: &str) -> Option<&CrewMember> {
        self.members.get(crew_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &CrewMember> {
        self.members.values()
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    pub fn is_assigned(&self, flight_id: &str, departure: Timestamp) -> bool {
        self.assignments
            .contains_key(&(flight_id.to_string(), departure))
    }

    /// Fold a roster into the ledger
    ///
    /// Qualifications come from the roster. Duty entries the ledger does not
    /// already hold are added, and the later of the two rest clocks is kept.
    pub fn merge_roster<'a>(&mut self, roster: impl IntoIterator<Item = &'a CrewMember>) {
        for incoming in roster {
            match self.members.get_mut(&incoming.crew_id) {
                None => {
                    self.members
                        .insert(incoming.crew_id.clone(), incoming.clone());
                }
                Some(existing) => {
                    existing.qualifications = incoming.qualifications.clone();
                    for entry in &incoming.duty_log {
                        if !existing.duty_log.contains(entry) {
                            existing.duty_log.push(entry.clone());
                        }
                    }
                    existing.duty_log.sort_by_key(|e| e.starts_at);
                    existing.rest_started_at = existing.rest_started_at.max(incoming.rest_started_at);
                }
            }
        }
    }

    /// Oldest point still relevant to duty checks at `as_of`
    ///
    /// One rolling window plus one rest period back. Duty that ended earlier
    /// no longer counts toward any window or rest check from `as_of` on.
    pub fn retention_cutoff(as_of: Timestamp, t: &CrewThresholds) -> Timestamp {
        shift_hours(as_of, -(t.rolling_window_hours + t.min_rest_hours))
    }

    /// Drop duty entries and assignments that ended at or before `cutoff`
    ///
    /// # Returns
    ///
    /// The number of duty entries and assignments removed.
    pub fn prune(&mut self, cutoff: Timestamp) -> usize {
        let mut removed = 0;
        for member in self.members.values_mut() {
            let before = member.duty_log.len();
            member
                .duty_log
                .retain(|entry| shift_hours(entry.starts_at, entry.hours) > cutoff);
            removed += before - member.duty_log.len();
        }
        let before = self.assignments.len();
        self.assignments.retain(|_, a| a.scheduled_arrival > cutoff);
        removed += before - self.assignments.len();

        if removed > 0 {
            debug!("Pruned {} ledger records ending before {}", removed, cutoff);
        }
        removed
    }

    /// Per-member duty view as of `at`
    pub fn status(&self, at: Timestamp, window_hours: f64) -> Vec<CrewDutyStatus> {
        self.members
            .values()
            .map(|m| CrewDutyStatus {
                crew_id: m.crew_id.clone(),
                qualifications: m.qualifications.iter().cloned().collect(),
                rolling_duty_hours: m.rolling_duty_hours(at, window_hours),
                peak_duty_hours: m.peak_duty_hours(window_hours),
                rest_started_at: m.rest_started_at,
                assigned_flights: m
                    .duty_log
                    .iter()
                    .filter_map(|e| e.flight_id.clone())
                    .collect(),
            })
            .collect()
    }

    /// Pick the best eligible member not already chosen for this flight
    ///
    /// Eligible means qualified for the type, rested at departure, free of
    /// any logged duty within a rest period of the leg, and still within the
    /// maximum once the duty is added. Lowest projected hours wins,
    /// then lowest crew id.
    fn best_candidate(
        &self,
        flight: &AggregatedFlightMetric,
        chosen: &[String],
        t: &CrewThresholds,
    ) -> Option<String> {
        self.members
            .values()
            .filter(|m| !chosen.contains(&m.crew_id))
            .filter(|m| m.is_qualified_for(&flight.aircraft_type))
            .filter(|m| {
                m.is_available_for(
                    flight.scheduled_departure,
                    flight.scheduled_arrival,
                    t.min_rest_hours,
                )
            })
            .map(|m| {
                let projected = m.projected_peak_hours(
                    flight.scheduled_departure,
                    flight.block_hours,
                    t.rolling_window_hours,
                );
                (projected, m)
            })
            .filter(|(projected, _)| *projected <= t.max_duty_hours)
            .min_by(|(a, ma), (b, mb)| a.total_cmp(b).then_with(|| ma.crew_id.cmp(&mb.crew_id)))
            .map(|(_, m)| m.crew_id.clone())
    }

    /// Write one fully-crewed flight into the ledger
    fn commit(&mut self, flight: &AggregatedFlightMetric, crew_ids: Vec<String>) -> Assignment {
        for crew_id in &crew_ids {
            if let Some(member) = self.members.get_mut(crew_id) {
                member.duty_log.push(DutyEntry {
                    flight_id: Some(flight.flight_id.clone()),
                    starts_at: flight.scheduled_departure,
                    hours: flight.block_hours,
                });
                member.duty_log.sort_by_key(|e| e.starts_at);
                member.rest_started_at = Some(flight.scheduled_arrival);
            }
        }
        let assignment = Assignment {
            flight_id: flight.flight_id.clone(),
            aircraft_type: flight.aircraft_type.clone(),
            scheduled_departure: flight.scheduled_departure,
            scheduled_arrival: flight.scheduled_arrival,
            duty_hours: flight.block_hours,
            crew_ids,
        };
        self.assignments.insert(
            (flight.flight_id.clone(), flight.scheduled_departure),
            assignment.clone(),
        );
        assignment
    }

    /// Greedily crew every flight the ledger has not crewed yet
    ///
    /// Flights are taken in (scheduled departure, flight id) order. After the
    /// pass every member is checked against the rolling-window limit.
    pub fn assign<'a>(
        &mut self,
        flights: impl IntoIterator<Item = &'a AggregatedFlightMetric>,
        t: &CrewThresholds,
    ) -> CrewPlan {
        let mut pending: Vec<&AggregatedFlightMetric> = flights
            .into_iter()
            .filter(|f| !self.is_assigned(&f.flight_id, f.scheduled_departure))
            .collect();
        pending.sort_by(|a, b| {
            a.scheduled_departure
                .cmp(&b.scheduled_departure)
                .then_with(|| a.flight_id.cmp(&b.flight_id))
        });

        let mut plan = CrewPlan::default();
        for flight in pending {
            let mut chosen: Vec<String> = Vec::new();
            while chosen.len() < flight.crew_required as usize {
                match self.best_candidate(flight, &chosen, t) {
                    Some(crew_id) => chosen.push(crew_id),
                    None => break,
                }
            }

            if chosen.len() == flight.crew_required as usize {
                debug!("Crewed {} with {:?}", flight.flight_id, chosen);
                plan.assignments.push(self.commit(flight, chosen));
            } else {
                let shortage = CrewShortage {
                    infeasible: AssignmentInfeasible {
                        flight_id: flight.flight_id.clone(),
                        required: flight.crew_required,
                        assigned: chosen.len() as u32,
                    },
                    aircraft_type: flight.aircraft_type.clone(),
                    scheduled_departure: flight.scheduled_departure,
                    duty_hours: flight.block_hours,
                    qualified_candidates: self
                        .members
                        .values()
                        .filter(|m| m.is_qualified_for(&flight.aircraft_type))
                        .count(),
                };
                warn!("{}", shortage.infeasible);
                plan.shortages.push(shortage);
            }
        }

        plan.compliance = self.compliance(t);
        info!(
            "Crew pass: {} flights crewed, {} shortages, {} members at or over the duty limit",
            plan.assignments.len(),
            plan.shortages.len(),
            plan.compliance
                .iter()
                .filter(|c| c.severity > Severity::Normal)
                .count()
        );
        plan
    }

    /// Rolling-window standing of every member
    ///
    /// Over the limit is critical, within the near-limit band is a watch, and
    /// everyone else is normal so a member who recovers clears their alert.
    pub fn compliance(&self, t: &CrewThresholds) -> Vec<ComplianceFinding> {
        let near_limit = t.max_duty_hours * t.near_limit_ratio;
        self.members
            .values()
            .map(|m| {
                let peak = m.peak_duty_hours(t.rolling_window_hours);
                let severity = if peak > t.max_duty_hours {
                    Severity::Critical
                } else if peak >= near_limit {
                    Severity::Watch
                } else {
                    Severity::Normal
                };
                ComplianceFinding {
                    crew_id: m.crew_id.clone(),
                    peak_duty_hours: peak,
                    max_duty_hours: t.max_duty_hours,
                    severity,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{crew_member, day_hour, scheduled_flight};

    #[test]
    fn test_lowest_hours_member_is_picked() {
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[
            crew_member("C1", &["A320"], &[(day_hour(1, 0), 20.0)]),
            crew_member("C2", &["A320"], &[(day_hour(1, 0), 5.0)]),
        ]);
        let flight = scheduled_flight("GA1001", "A320", day_hour(2, 6), 2.0, 1);

        let plan = ledger.assign([&flight], &CrewThresholds::default());
        assert_eq!(plan.assignments.len(), 1);
        assert_eq!(plan.assignments[0].crew_ids, vec!["C2".to_string()]);
        assert!(ledger.is_assigned("GA1001", flight.scheduled_departure));
    }

    #[test]
    fn test_ties_break_on_crew_id() {
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[
            crew_member("C9", &["A320"], &[]),
            crew_member("C3", &["A320"], &[]),
        ]);
        let flight = scheduled_flight("GA1001", "A320", day_hour(2, 6), 2.0, 1);
        let plan = ledger.assign([&flight], &CrewThresholds::default());
        assert_eq!(plan.assignments[0].crew_ids, vec!["C3".to_string()]);
    }

    #[test]
    fn test_unqualified_and_unrested_members_are_skipped() {
        let mut ledger = DutyLedger::new();
        let mut tired = crew_member("C1", &["A320"], &[]);
        tired.rest_started_at = Some(day_hour(2, 0));
        ledger.merge_roster(&[tired, crew_member("C2", &["B737"], &[])]);

        let flight = scheduled_flight("GA1001", "A320", day_hour(2, 6), 2.0, 1);
        let plan = ledger.assign([&flight], &CrewThresholds::default());
        assert!(plan.assignments.is_empty());
        assert_eq!(plan.shortages.len(), 1);
        assert_eq!(plan.shortages[0].qualified_candidates, 1);
    }

    #[test]
    fn test_scenario_candidate_near_ceiling_is_infeasible() {
        let t = CrewThresholds::default();
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[crew_member(
            "C1",
            &["A320"],
            &[(day_hour(1, 0), 30.0), (day_hour(2, 0), 29.0)],
        )]);
        let before = ledger.member("C1").cloned();

        let flight = scheduled_flight("GA1002", "A320", day_hour(4, 6), 2.5, 1);
        let plan = ledger.assign([&flight], &t);

        assert!(plan.assignments.is_empty());
        assert_eq!(
            plan.shortages[0].infeasible,
            AssignmentInfeasible {
                flight_id: "GA1002".to_string(),
                required: 1,
                assigned: 0,
            }
        );
        assert_eq!(ledger.member("C1").cloned(), before);
        assert!(!ledger.is_assigned("GA1002", flight.scheduled_departure));
    }

    #[test]
    fn test_partial_crew_commits_nothing() {
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[crew_member("C1", &["A320"], &[])]);
        let flight = scheduled_flight("GA1001", "A320", day_hour(2, 6), 2.0, 2);

        let plan = ledger.assign([&flight], &CrewThresholds::default());
        assert_eq!(plan.shortages[0].infeasible.assigned, 1);
        assert!(ledger.member("C1").map(|m| m.duty_log.is_empty()).unwrap_or(false));
        assert!(ledger.member("C1").and_then(|m| m.rest_started_at).is_none());
    }

    #[test]
    fn test_rest_clock_blocks_back_to_back_legs() {
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[
            crew_member("C1", &["A320"], &[]),
            crew_member("C2", &["A320"], &[]),
        ]);
        let first = scheduled_flight("GA1001", "A320", day_hour(2, 6), 2.0, 1);
        let second = scheduled_flight("GA1003", "A320", day_hour(2, 10), 2.0, 1);

        let plan = ledger.assign([&second, &first], &CrewThresholds::default());
        assert_eq!(plan.assignments[0].flight_id, "GA1001");
        assert_eq!(plan.assignments[0].crew_ids, vec!["C1".to_string()]);
        assert_eq!(plan.assignments[1].crew_ids, vec!["C2".to_string()]);
        assert_eq!(
            ledger.member("C1").and_then(|m| m.rest_started_at),
            Some(day_hour(2, 8))
        );
    }

    #[test]
    fn test_assigned_flights_are_not_recrewed() {
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[crew_member("C1", &["A320"], &[])]);
        let flight = scheduled_flight("GA1001", "A320", day_hour(2, 6), 2.0, 1);
        let t = CrewThresholds::default();

        assert_eq!(ledger.assign([&flight], &t).assignments.len(), 1);
        assert!(ledger.assign([&flight], &t).assignments.is_empty());
        assert_eq!(ledger.member("C1").map(|m| m.duty_log.len()), Some(1));
    }

    #[test]
    fn test_compliance_findings() {
        let t = CrewThresholds::default();
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[
            crew_member("C1", &["A320"], &[(day_hour(1, 0), 62.0)]),
            crew_member("C2", &["A320"], &[(day_hour(1, 0), 55.0)]),
            crew_member("C3", &["A320"], &[(day_hour(1, 0), 10.0)]),
        ]);
        let findings = ledger.compliance(&t);
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].crew_id, "C1");
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[1].crew_id, "C2");
        assert_eq!(findings[1].severity, Severity::Watch);
        assert_eq!(findings[2].severity, Severity::Normal);
    }

    #[test]
    fn test_member_already_on_duty_is_not_double_booked() {
        let mut ledger = DutyLedger::new();
        // On duty 06:00-10:00 from the roster, rest clock never set
        ledger.merge_roster(&[crew_member("C1", &["A320"], &[(day_hour(2, 6), 4.0)])]);
        let flight = scheduled_flight("GA1", "A320", day_hour(2, 7), 2.0, 1);

        let plan = ledger.assign([&flight], &CrewThresholds::default());
        assert!(plan.assignments.is_empty());
        assert_eq!(plan.shortages.len(), 1);
        assert_eq!(ledger.member("C1").map(|m| m.duty_log.len()), Some(1));
    }

    #[test]
    fn test_prune_drops_duty_and_assignments_past_cutoff() {
        let t = CrewThresholds::default();
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&[crew_member("C1", &["A320"], &[(day_hour(1, 0), 8.0)])]);
        let flight = scheduled_flight("GA1001", "A320", day_hour(2, 6), 2.0, 1);
        ledger.assign([&flight], &t);

        // Nothing has aged out a day later
        assert_eq!(ledger.prune(DutyLedger::retention_cutoff(day_hour(3, 0), &t)), 0);

        // The roster duty, the crewed leg and its assignment all end by then
        assert_eq!(ledger.prune(day_hour(2, 8)), 3);
        assert_eq!(ledger.assignments().count(), 0);
        assert_eq!(ledger.member("C1").map(|m| m.duty_log.len()), Some(0));
        assert!(ledger.member("C1").is_some());
    }

    #[test]
    fn test_merge_roster_is_idempotent() {
        let roster = vec![crew_member("C1", &["A320"], &[(day_hour(1, 0), 8.0)])];
        let mut ledger = DutyLedger::new();
        ledger.merge_roster(&roster);
        ledger.merge_roster(&roster);
        assert_eq!(ledger.member("C1").map(|m| m.duty_log.len()), Some(1));
    }
}
