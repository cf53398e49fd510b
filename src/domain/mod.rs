// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// One subdirectory per record type with lifecycle rules:
// - order   - status graph, code allocation, vehicle assignment
// - vehicle - status, fuel/mileage alerts, maintenance scanner
//
// Managers depend on the store traits and the notification bus only.
//
// ============================================================================

pub mod errors;
pub mod order;
pub mod vehicle;

#[cfg(test)]
pub(crate) mod testkit;

pub use errors::{Entity, LifecycleError};
