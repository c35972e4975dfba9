pub mod orchestrator;
pub mod suggestion;

pub use orchestrator::AvailabilityOrchestrator;
pub use suggestion::{merge_busy_intervals, suggest_slots};
