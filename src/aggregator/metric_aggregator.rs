use crate::error::{DataError, RecordKind};
use crate::ingest::RawBatch;
use crate::records::{
    AircraftMetric, BookingRecord, CrewMember, FlightRecord, RouteWeather, Timestamp,
};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-flight summary of every logged leg record in the batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedFlightMetric {
    pub flight_id: String,
    /// Number of leg records folded into this metric
    pub record_count: usize,
    /// Aircraft, type and schedule of the latest leg
    pub aircraft_id: String,
    pub aircraft_type: String,
    pub origin: String,
    pub destination: String,
    pub scheduled_departure: Timestamp,
    pub scheduled_arrival: Timestamp,
    pub crew_required: u32,
    pub peak_weather_severity: f64,
    pub peak_maintenance_issues: u32,
    pub mean_congestion: f64,
    /// Scheduled block time of the latest leg in hours
    pub block_hours: f64,
    /// Departure delay of the latest leg that has actually departed
    pub observed_delay_minutes: Option<f64>,
}

impl AggregatedFlightMetric {
    pub fn route_id(&self) -> String {
        format!("{}-{}", self.origin, self.destination)
    }
}

/// Per-aircraft summary of the sensor polls in the batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedAircraftMetric {
    pub registration: String,
    pub sample_count: usize,
    /// The most recent poll; the health checks run against it
    pub latest: AircraftMetric,
    pub peak_vibration: Option<f64>,
    pub mean_fuel_consumption: Option<f64>,
}

/// Per-flight booking summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingMetric {
    pub flight_id: String,
    pub snapshot_count: usize,
    pub bookings: u32,
    pub capacity: u32,
    pub no_show_rate: Option<f64>,
    /// Relative change in bookings from the first snapshot to the last
    pub trend: f64,
    pub as_of: Timestamp,
}

/// Everything the models need for one cycle
///
/// Immutable once built; maps are keyed by record id so iteration order is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleMetrics {
    pub as_of: Timestamp,
    pub flights: BTreeMap<String, AggregatedFlightMetric>,
    pub aircraft: BTreeMap<String, AggregatedAircraftMetric>,
    pub bookings: BTreeMap<String, BookingMetric>,
    /// Crew roster, keyed by crew id (later records for the same id win)
    pub roster: BTreeMap<String, CrewMember>,
    /// Latest weather per route
    pub routes: BTreeMap<String, RouteWeather>,
    /// Records skipped because they were malformed
    pub errors: Vec<DataError>,
}

impl CycleMetrics {
    pub fn empty(as_of: Timestamp) -> Self {
        Self {
            as_of,
            flights: BTreeMap::new(),
            aircraft: BTreeMap::new(),
            bookings: BTreeMap::new(),
            roster: BTreeMap::new(),
            routes: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

/// A raw record kind the aggregator knows how to decode and validate
trait Record: DeserializeOwned {
    const KIND: RecordKind;
    /// Field holding the record's identifier
    const ID_FIELD: &'static str;

    fn validate(&self) -> Result<(), String>;
}

impl Record for FlightRecord {
    const KIND: RecordKind = RecordKind::Flight;
    const ID_FIELD: &'static str = "flight_id";

    fn validate(&self) -> Result<(), String> {
        self.check()
    }
}

impl Record for AircraftMetric {
    const KIND: RecordKind = RecordKind::Aircraft;
    const ID_FIELD: &'static str = "registration";

    fn validate(&self) -> Result<(), String> {
        self.check()
    }
}

impl Record for BookingRecord {
    const KIND: RecordKind = RecordKind::Booking;
    const ID_FIELD: &'static str = "flight_id";

    fn validate(&self) -> Result<(), String> {
        self.check()
    }
}

impl Record for CrewMember {
    const KIND: RecordKind = RecordKind::Crew;
    const ID_FIELD: &'static str = "crew_id";

    fn validate(&self) -> Result<(), String> {
        self.check()
    }
}

impl Record for RouteWeather {
    const KIND: RecordKind = RecordKind::Route;
    const ID_FIELD: &'static str = "route_id";

    fn validate(&self) -> Result<(), String> {
        self.check()
    }
}

/// Decode every raw value of one kind, collecting the malformed ones
fn decode_all<T: Record>(values: &[Value], errors: &mut Vec<DataError>) -> Vec<T> {
    let mut decoded = Vec::with_capacity(values.len());
    for (index, value) in values.iter().enumerate() {
        let record_id = value
            .get(T::ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));

        let result = serde_json::from_value::<T>(value.clone())
            .map_err(|e| e.to_string())
            .and_then(|record| record.validate().map(|_| record));

        match result {
            Ok(record) => decoded.push(record),
            Err(reason) => {
                let error = DataError::new(T::KIND, record_id, reason);
                warn!("Skipping {}", error);
                errors.push(error);
            }
        }
    }
    decoded
}

/// Normalize a raw batch into the metrics for one cycle
///
/// Never fails: malformed records are skipped and listed in
/// `CycleMetrics::errors`, and an empty batch yields empty metrics.
///
/// # Arguments
///
/// * `batch` - Raw records for the cycle
/// * `as_of` - Cycle timestamp
pub fn aggregate(batch: &RawBatch, as_of: Timestamp) -> CycleMetrics {
    let mut metrics = CycleMetrics::empty(as_of);
    let mut errors = Vec::new();

    let flights: Vec<FlightRecord> = decode_all(&batch.flights, &mut errors);
    let polls: Vec<AircraftMetric> = decode_all(&batch.aircraft, &mut errors);
    let bookings: Vec<BookingRecord> = decode_all(&batch.bookings, &mut errors);
    let roster: Vec<CrewMember> = decode_all(&batch.crew, &mut errors);
    let routes: Vec<RouteWeather> = decode_all(&batch.routes, &mut errors);

    metrics.flights = aggregate_flights(flights);
    metrics.aircraft = aggregate_aircraft(polls);
    metrics.bookings = aggregate_bookings(bookings);

    for member in roster {
        metrics.roster.insert(member.crew_id.clone(), member);
    }

    for route in routes {
        let newer = metrics
            .routes
            .get(&route.route_id)
            .map_or(true, |existing| route.timestamp >= existing.timestamp);
        if newer {
            metrics.routes.insert(route.route_id.clone(), route);
        }
    }

    metrics.errors = errors;

    debug!(
        "Aggregated {} flights, {} aircraft, {} booking series, {} crew, {} routes ({} malformed)",
        metrics.flights.len(),
        metrics.aircraft.len(),
        metrics.bookings.len(),
        metrics.roster.len(),
        metrics.routes.len(),
        metrics.errors.len()
    );

    metrics
}

fn group_by<T, F>(records: Vec<T>, key: F) -> BTreeMap<String, Vec<T>>
where
    F: Fn(&T) -> &str,
{
    let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for record in records {
        groups.entry(key(&record).to_string()).or_default().push(record);
    }
    groups
}

fn aggregate_flights(records: Vec<FlightRecord>) -> BTreeMap<String, AggregatedFlightMetric> {
    let mut out = BTreeMap::new();
    for (flight_id, mut legs) in group_by(records, |r| &r.flight_id) {
        legs.sort_by_key(|leg| leg.scheduled_departure);
        let Some(latest) = legs.last() else {
            continue;
        };

        let count = legs.len();
        let peak_weather_severity = legs.iter().map(|l| l.weather_severity).fold(0.0, f64::max);
        let peak_maintenance_issues = legs.iter().map(|l| l.maintenance_issues).max().unwrap_or(0);
        let mean_congestion = legs.iter().map(|l| l.congestion).sum::<f64>() / count as f64;
        let observed_delay_minutes = legs
            .iter()
            .rev()
            .find_map(FlightRecord::departure_delay_minutes);

        out.insert(
            flight_id.clone(),
            AggregatedFlightMetric {
                flight_id,
                record_count: count,
                aircraft_id: latest.aircraft_id.clone(),
                aircraft_type: latest.aircraft_type.clone(),
                origin: latest.origin.clone(),
                destination: latest.destination.clone(),
                scheduled_departure: latest.scheduled_departure,
                scheduled_arrival: latest.scheduled_arrival,
                crew_required: latest.crew_required,
                peak_weather_severity,
                peak_maintenance_issues,
                mean_congestion,
                block_hours: latest.block_hours(),
                observed_delay_minutes,
            },
        );
    }
    out
}

fn aggregate_aircraft(polls: Vec<AircraftMetric>) -> BTreeMap<String, AggregatedAircraftMetric> {
    let mut out = BTreeMap::new();
    for (registration, mut samples) in group_by(polls, |p| &p.registration) {
        samples.sort_by_key(|s| s.timestamp);
        let sample_count = samples.len();

        let peak_vibration = samples
            .iter()
            .filter_map(|s| s.engine_vibration)
            .reduce(f64::max);
        let fuel: Vec<f64> = samples.iter().filter_map(|s| s.fuel_consumption).collect();
        let mean_fuel_consumption = if fuel.is_empty() {
            None
        } else {
            Some(fuel.iter().sum::<f64>() / fuel.len() as f64)
        };

        let Some(latest) = samples.pop() else {
            continue;
        };
        out.insert(
            registration.clone(),
            AggregatedAircraftMetric {
                registration,
                sample_count,
                latest,
                peak_vibration,
                mean_fuel_consumption,
            },
        );
    }
    out
}

fn aggregate_bookings(records: Vec<BookingRecord>) -> BTreeMap<String, BookingMetric> {
    let mut out = BTreeMap::new();
    for (flight_id, mut snapshots) in group_by(records, |b| &b.flight_id) {
        snapshots.sort_by_key(|s| s.timestamp);
        let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
            continue;
        };

        let trend = if snapshots.len() < 2 || first.bookings == 0 {
            0.0
        } else {
            (last.bookings as f64 - first.bookings as f64) / first.bookings as f64
        };

        out.insert(
            flight_id.clone(),
            BookingMetric {
                flight_id,
                snapshot_count: snapshots.len(),
                bookings: last.bookings,
                capacity: last.capacity,
                no_show_rate: last.no_show_rate,
                trend,
                as_of: last.timestamp,
            },
        );
    }
    out
}
