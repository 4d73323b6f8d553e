//! One monitoring cycle, end to end
//!
//! Aggregation, scoring, classification and snapshot publication. Cycles are
//! serialized by the cycle counter's mutex, so the loop and any synchronous
//! caller can share one engine.

use crate::aggregator::{aggregate, CycleMetrics};
use crate::alerts::{AlertClassifier, AlertSnapshot, AlertStore, RiskSignal};
use crate::config::{Config, ConfigHandle, MonitoringConfig, ThresholdConfig};
use crate::error::ConfigError;
use crate::ingest::RawBatch;
use crate::models::{
    delay, health, load, route, AlternateLookup, CrewDutyStatus, CrewPlan, DelayAssessment,
    DutyLedger, HealthAssessment, LoadAssessment, RouteAssessment,
};
use crate::records::Timestamp;
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Every model's output for one cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleAssessments {
    pub delays: Vec<DelayAssessment>,
    pub health: Vec<HealthAssessment>,
    pub loads: Vec<LoadAssessment>,
    pub routes: Vec<RouteAssessment>,
    pub crew: CrewPlan,
}

impl CycleAssessments {
    /// All outputs as alert signals, model by model
    pub fn signals(&self) -> Vec<&dyn RiskSignal> {
        let mut signals: Vec<&dyn RiskSignal> = Vec::new();
        signals.extend(self.delays.iter().map(|s| s as &dyn RiskSignal));
        signals.extend(self.health.iter().map(|s| s as &dyn RiskSignal));
        signals.extend(self.loads.iter().map(|s| s as &dyn RiskSignal));
        signals.extend(self.routes.iter().map(|s| s as &dyn RiskSignal));
        signals.extend(self.crew.assignments.iter().map(|s| s as &dyn RiskSignal));
        signals.extend(self.crew.shortages.iter().map(|s| s as &dyn RiskSignal));
        signals.extend(self.crew.compliance.iter().map(|s| s as &dyn RiskSignal));
        signals
    }
}

/// Lock a mutex, taking over the state if a previous holder panicked
fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Recovering {} after a panicked cycle", what);
        poisoned.into_inner()
    })
}

/// Runs cycles against shared configuration, duty ledger and alert state
pub struct RiskEngine {
    config: Arc<ConfigHandle>,
    alternates: Arc<dyn AlternateLookup>,
    ledger: Mutex<DutyLedger>,
    cycle: Mutex<u64>,
    store: Arc<AlertStore>,
    limits: MonitoringConfig,
}

impl RiskEngine {
    /// Create an engine
    ///
    /// # Arguments
    ///
    /// * `config` - Hot-swappable thresholds
    /// * `alternates` - Diversion alternates per destination
    /// * `limits` - History length and alert retention
    pub fn new(
        config: Arc<ConfigHandle>,
        alternates: Arc<dyn AlternateLookup>,
        limits: MonitoringConfig,
    ) -> Self {
        Self {
            config,
            alternates,
            ledger: Mutex::new(DutyLedger::new()),
            cycle: Mutex::new(0),
            store: Arc::new(AlertStore::new()),
            limits,
        }
    }

    /// Create an engine from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let handle = ConfigHandle::new(config.thresholds.clone())?;
        Ok(Self::new(
            Arc::new(handle),
            Arc::new(config.alternates.clone()),
            config.monitoring.clone(),
        ))
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn store(&self) -> Arc<AlertStore> {
        Arc::clone(&self.store)
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> Arc<AlertSnapshot> {
        self.store.load()
    }

    /// Copy of the duty ledger as it stands between cycles
    pub fn ledger_view(&self) -> DutyLedger {
        lock(&self.ledger, "duty ledger").clone()
    }

    /// Crew duty view as of `at`
    pub fn crew_status(&self, at: Timestamp) -> Vec<CrewDutyStatus> {
        let window = self.config.load().crew.rolling_window_hours;
        lock(&self.ledger, "duty ledger").status(at, window)
    }

    /// Run every model over one cycle's metrics
    ///
    /// The crew pass writes into the duty ledger; the other models are pure.
    /// Ledger records that ended before the retention cutoff are pruned first,
    /// and flights that arrived before it are not crewed.
    pub fn assess(&self, metrics: &CycleMetrics, thresholds: &ThresholdConfig) -> CycleAssessments {
        let delays = delay::assess_all(&metrics.flights, &thresholds.delay);
        let health = health::assess_all(&metrics.aircraft, &thresholds.health);
        let loads = load::assess_all(&metrics.bookings, &thresholds.load);
        let routes = route::assess_all(
            &metrics.routes,
            &metrics.flights,
            &thresholds.route,
            self.alternates.as_ref(),
        );

        let crew = {
            let cutoff = DutyLedger::retention_cutoff(metrics.as_of, &thresholds.crew);
            let mut ledger = lock(&self.ledger, "duty ledger");
            ledger.merge_roster(metrics.roster.values());
            ledger.prune(cutoff);
            ledger.assign(
                metrics
                    .flights
                    .values()
                    .filter(|f| f.scheduled_arrival > cutoff),
                &thresholds.crew,
            )
        };

        debug!(
            "Assessed {} delays, {} aircraft, {} loads, {} routes",
            delays.len(),
            health.len(),
            loads.len(),
            routes.len()
        );

        CycleAssessments {
            delays,
            health,
            loads,
            routes,
            crew,
        }
    }

    /// Run one complete cycle and publish its snapshot
    ///
    /// Never fails on bad data: malformed records are skipped and listed in
    /// the snapshot. The thresholds are read once at the start, so a swap
    /// during the cycle only affects the next one.
    pub fn run_cycle(&self, batch: &RawBatch) -> Arc<AlertSnapshot> {
        let mut cycle = lock(&self.cycle, "cycle counter");
        let number = *cycle + 1;
        let as_of = batch.as_of.unwrap_or_else(Utc::now);
        let thresholds = self.config.load();

        info!("Starting cycle {} as of {}", number, as_of);

        let metrics = aggregate(batch, as_of);
        let assessments = self.assess(&metrics, &thresholds);
        let alerts = AlertClassifier::new(as_of).classify_all(assessments.signals());

        let mut next = self.store.load().successor(number, as_of);
        let transitions = next.merge_alerts(alerts, self.limits.history_limit);
        let retired = next.retire_stale(self.limits.alert_retention_cycles);
        {
            let ledger = lock(&self.ledger, "duty ledger");
            next.set_assignments(ledger.assignments().cloned().collect());
            next.set_crew(ledger.status(as_of, thresholds.crew.rolling_window_hours));
        }
        next.set_data_errors(metrics.errors);
        next.complete(Utc::now());

        let published = self.store.publish(next);
        *cycle = number;

        let summary = published.summary();
        info!(
            "Cycle {} complete: {} alerts, {} transitions, {} retired, {} malformed records",
            number,
            summary.total,
            transitions,
            retired,
            published.data_errors().len()
        );
        published
    }
}
