// ============================================================================
// Actors Module
// ============================================================================
//
// Actors are reserved for long-lived infrastructure concerns:
// - maintenance    - timer that drives the maintenance scanner
// - push_session   - one WebSocket client of the push transport
//
// Lifecycle rules live in the domain managers, not here.
//
// ============================================================================

mod maintenance;
mod push_session;

pub use maintenance::{GetScanStatus, MaintenanceScheduleActor, ScanStatus};
pub use push_session::PushSession;
