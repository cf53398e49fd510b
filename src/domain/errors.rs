use crate::store::StoreError;

// ============================================================================
// Lifecycle Errors
// ============================================================================
//
// Every rejected command maps to exactly one of these kinds so the calling
// layer can render a specific message.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Order,
    Vehicle,
    Notification,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Order => f.write_str("Order"),
            Entity::Vehicle => f.write_str("Vehicle"),
            Entity::Notification => f.write_str("Notification"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: i64 },

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Vehicle {vehicle_id} is not available (status: {status})")]
    VehicleNotAvailable { vehicle_id: i64, status: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl LifecycleError {
    pub fn order_not_found(id: i64) -> Self {
        LifecycleError::NotFound { entity: Entity::Order, id }
    }

    pub fn vehicle_not_found(id: i64) -> Self {
        LifecycleError::NotFound { entity: Entity::Vehicle, id }
    }

    pub fn notification_not_found(id: i64) -> Self {
        LifecycleError::NotFound { entity: Entity::Notification, id }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::NotFound { .. } => "not_found",
            LifecycleError::InvalidTransition { .. } => "invalid_transition",
            LifecycleError::VehicleNotAvailable { .. } => "vehicle_not_available",
            LifecycleError::InvalidArgument(_) => "invalid_argument",
            LifecycleError::Persistence(_) => "persistence_failure",
        }
    }
}
