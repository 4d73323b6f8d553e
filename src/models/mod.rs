/// Risk scoring models
///
/// All models except the crew optimizer are pure functions of the cycle's
/// metrics and the active thresholds.
pub mod crew;
pub mod delay;
pub mod health;
pub mod load;
pub mod route;

pub use crew::{Assignment, ComplianceFinding, CrewDutyStatus, CrewPlan, CrewShortage, DutyLedger};
pub use delay::{DelayAssessment, DelayCategory, DelayFactor};
pub use health::{HealthAssessment, Subsystem, SubsystemStatus};
pub use load::{LoadAssessment, LoadCategory};
pub use route::{Alternate, AlternateLookup, AlternateTable, RouteAssessment, RouteRisk};
