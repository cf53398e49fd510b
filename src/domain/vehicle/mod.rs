// ============================================================================
// Vehicle Domain
// ============================================================================
//
// - Value objects (VehicleStatus)
// - Lifecycle manager (status, fuel, mileage, fleet queries)
// - Maintenance scanner
//
// ============================================================================

pub mod lifecycle;
pub mod maintenance;
pub mod value_objects;

pub use lifecycle::*;
pub use maintenance::*;
pub use value_objects::*;
