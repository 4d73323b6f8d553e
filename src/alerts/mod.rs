/// Alert types, classification and the shared alert state
pub mod alert;
pub mod classifier;
pub mod state;

pub use alert::{Alert, AlertCategory, AlertKey, AlertTransition, Subject, SubjectType};
pub use classifier::{AlertClassifier, RiskSignal};
pub use state::{AlertSnapshot, AlertStore, AlertSummary};
