// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderStatus with its transition graph, OrderPriority)
// - Lifecycle manager (create, status changes, vehicle assignment, queries)
//
// ============================================================================

pub mod lifecycle;
pub mod value_objects;

pub use lifecycle::*;
pub use value_objects::*;
