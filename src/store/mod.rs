// ============================================================================
// Store - Repository interfaces over the persistence layer
// ============================================================================
//
// One trait per record type, plus the few conditional primitives the
// lifecycle managers need to stay race-free:
// - code sequences (atomic, never reused)
// - compare-and-set on order status and vehicle mileage
// - the joint order/vehicle assignment as a single unit of work
//
// Adapters:
// - memory   - in-process, used by tests and when no database is configured
// - postgres - sqlx over Postgres
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::domain::order::{OrderPriority, OrderStatus};
use crate::domain::vehicle::VehicleStatus;
use crate::models::{NewVehicle, Notification, NotificationDraft, Order, OrderDraft, Vehicle};
use crate::utils::IsTransient;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Protocol(_)
            ),
            StoreError::Unavailable(_) => true,
            StoreError::Corrupt(_) => false,
        }
    }
}

// ============================================================================
// Filters & Outcomes
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub priority: Option<OrderPriority>,
}

#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub status: Option<VehicleStatus>,
}

/// Conditional order status write.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub expected: OrderStatus,
    pub next: OrderStatus,
    pub actual_delivery: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub enum CasOutcome<T> {
    Applied(T),
    /// The row moved on; carries the current row.
    Conflict(T),
    Missing,
}

#[derive(Debug, Clone)]
pub enum AssignmentOutcome {
    Assigned { order: Order, vehicle: Vehicle },
    OrderMissing,
    VehicleMissing,
    /// Order status no longer matches the validated one.
    OrderChanged(Order),
    VehicleUnavailable(Vehicle),
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Order>, StoreError>;

    /// Allocates id and `ORD-###` code atomically and persists in `pending`.
    async fn insert(&self, draft: &OrderDraft) -> Result<Order, StoreError>;

    /// Ordered by creation time, newest first.
    async fn find(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn compare_and_set_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<CasOutcome<Order>, StoreError>;
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Vehicle>, StoreError>;

    /// Allocates id and `VEH-###` code atomically and persists as `available`.
    async fn insert(&self, vehicle: &NewVehicle) -> Result<Vehicle, StoreError>;

    async fn find(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn set_status(&self, id: i64, status: VehicleStatus) -> Result<Option<Vehicle>, StoreError>;

    async fn set_fuel_level(&self, id: i64, level: i32) -> Result<Option<Vehicle>, StoreError>;

    async fn compare_and_set_mileage(
        &self,
        id: i64,
        expected: i64,
        next: i64,
    ) -> Result<CasOutcome<Vehicle>, StoreError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Notification>, StoreError>;

    /// Newest first.
    async fn list(&self, unread_only: bool) -> Result<Vec<Notification>, StoreError>;

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>, StoreError>;

    /// Returns the number of rows flipped.
    async fn mark_all_read(&self) -> Result<u64, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Moves the vehicle `available -> in_use` and the order
    /// `expected_order_status -> in_transit` with `vehicleId` set.
    /// Both writes land or neither does.
    async fn assign_vehicle(
        &self,
        order_id: i64,
        expected_order_status: OrderStatus,
        vehicle_id: i64,
    ) -> Result<AssignmentOutcome, StoreError>;
}

// ============================================================================
// Repositories - handles injected into the lifecycle managers
// ============================================================================

#[derive(Clone)]
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub assignments: Arc<dyn AssignmentStore>,
}

impl Repositories {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            orders: store.clone(),
            vehicles: store.clone(),
            notifications: store.clone(),
            assignments: store,
        }
    }

    pub fn postgres(store: Arc<PgStore>) -> Self {
        Self {
            orders: store.clone(),
            vehicles: store.clone(),
            notifications: store.clone(),
            assignments: store,
        }
    }
}
