use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use super::{
    AssignmentOutcome, AssignmentStore, CasOutcome, NotificationRepository, OrderFilter,
    OrderRepository, StatusChange, StoreError, VehicleFilter, VehicleRepository,
};
use crate::domain::order::{order_code, OrderStatus};
use crate::domain::vehicle::{vehicle_code, VehicleStatus};
use crate::models::{NewVehicle, Notification, NotificationDraft, Order, OrderDraft, Vehicle};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// A single mutex guards all tables, so every trait method is one atomic
// step. Fail points let tests break a unit of work halfway through.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Abort `assign_vehicle` after the vehicle row was written.
    AssignAfterVehicleWrite,
    /// Fail the next notification insert.
    NotificationInsert,
}

#[derive(Default)]
struct Tables {
    orders: BTreeMap<i64, Order>,
    vehicles: BTreeMap<i64, Vehicle>,
    notifications: BTreeMap<i64, Notification>,
    order_seq: i64,
    vehicle_seq: i64,
    notification_seq: i64,
    armed: HashSet<FailPoint>,
}

impl Tables {
    fn trip(&mut self, point: FailPoint) -> bool {
        self.armed.remove(&point)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure.
    pub async fn arm(&self, point: FailPoint) {
        self.tables.lock().await.armed.insert(point);
    }
}

fn newest_first<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> (chrono::DateTime<Utc>, i64),
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn insert(&self, draft: &OrderDraft) -> Result<Order, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.order_seq += 1;
        let id = tables.order_seq;
        let now = Utc::now();

        let order = Order {
            id,
            order_code: order_code(id),
            status: OrderStatus::Pending,
            priority: draft.priority,
            customer_name: draft.customer_name.clone(),
            destination: draft.destination.clone(),
            vehicle_id: None,
            estimated_delivery: draft.estimated_delivery,
            actual_delivery: None,
            total_amount: draft.total_amount,
            delivery_cost: draft.delivery_cost,
            notes: draft.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        tables.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn find(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| filter.priority.map_or(true, |p| o.priority == p))
            .cloned()
            .collect();
        newest_first(&mut rows, |o| (o.created_at, o.id));
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.tables.lock().await.orders.len() as i64)
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<CasOutcome<Order>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };

        if order.status != change.expected {
            return Ok(CasOutcome::Conflict(order.clone()));
        }

        order.status = change.next;
        if change.actual_delivery.is_some() {
            order.actual_delivery = change.actual_delivery;
        }
        order.updated_at = Utc::now();
        Ok(CasOutcome::Applied(order.clone()))
    }
}

// ============================================================================
// Vehicles
// ============================================================================

#[async_trait]
impl VehicleRepository for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Vehicle>, StoreError> {
        Ok(self.tables.lock().await.vehicles.get(&id).cloned())
    }

    async fn insert(&self, new: &NewVehicle) -> Result<Vehicle, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.vehicle_seq += 1;
        let id = tables.vehicle_seq;
        let now = Utc::now();

        let vehicle = Vehicle {
            id,
            vehicle_code: vehicle_code(id),
            plate_number: new.plate_number.clone(),
            model: new.model.clone(),
            brand: new.brand.clone(),
            status: VehicleStatus::Available,
            driver_name: new.driver_name.clone(),
            fuel_level: new.fuel_level,
            mileage: new.mileage,
            last_maintenance: new.last_maintenance,
            next_maintenance: new.next_maintenance,
            created_at: now,
            updated_at: now,
        };

        tables.vehicles.insert(id, vehicle.clone());
        Ok(vehicle)
    }

    async fn find(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Vehicle> = tables
            .vehicles
            .values()
            .filter(|v| filter.status.map_or(true, |s| v.status == s))
            .cloned()
            .collect();
        newest_first(&mut rows, |v| (v.created_at, v.id));
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.tables.lock().await.vehicles.len() as i64)
    }

    async fn set_status(&self, id: i64, status: VehicleStatus) -> Result<Option<Vehicle>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.vehicles.get_mut(&id).map(|vehicle| {
            vehicle.status = status;
            vehicle.updated_at = Utc::now();
            vehicle.clone()
        }))
    }

    async fn set_fuel_level(&self, id: i64, level: i32) -> Result<Option<Vehicle>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.vehicles.get_mut(&id).map(|vehicle| {
            vehicle.fuel_level = level;
            vehicle.updated_at = Utc::now();
            vehicle.clone()
        }))
    }

    async fn compare_and_set_mileage(
        &self,
        id: i64,
        expected: i64,
        next: i64,
    ) -> Result<CasOutcome<Vehicle>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(vehicle) = tables.vehicles.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };

        if vehicle.mileage != expected {
            return Ok(CasOutcome::Conflict(vehicle.clone()));
        }

        vehicle.mileage = next;
        vehicle.updated_at = Utc::now();
        Ok(CasOutcome::Applied(vehicle.clone()))
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.trip(FailPoint::NotificationInsert) {
            return Err(StoreError::Unavailable("injected notification insert failure".to_string()));
        }

        tables.notification_seq += 1;
        let notification = Notification {
            id: tables.notification_seq,
            kind: draft.kind,
            title: draft.title.clone(),
            message: draft.message.clone(),
            read: false,
            action: draft.action.clone(),
            metadata: draft.metadata.clone(),
            created_at: Utc::now(),
        };

        tables.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>, StoreError> {
        Ok(self.tables.lock().await.notifications.get(&id).cloned())
    }

    async fn list(&self, unread_only: bool) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect();
        newest_first(&mut rows, |n| (n.created_at, n.id));
        Ok(rows)
    }

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.notifications.get_mut(&id).map(|n| {
            n.read = true;
            n.clone()
        }))
    }

    async fn mark_all_read(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut flipped = 0;
        for notification in tables.notifications.values_mut().filter(|n| !n.read) {
            notification.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.notifications.remove(&id).is_some())
    }
}

// ============================================================================
// Assignment
// ============================================================================

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn assign_vehicle(
        &self,
        order_id: i64,
        expected_order_status: OrderStatus,
        vehicle_id: i64,
    ) -> Result<AssignmentOutcome, StoreError> {
        let mut tables = self.tables.lock().await;

        let Some(order) = tables.orders.get(&order_id).cloned() else {
            return Ok(AssignmentOutcome::OrderMissing);
        };
        let Some(vehicle_before) = tables.vehicles.get(&vehicle_id).cloned() else {
            return Ok(AssignmentOutcome::VehicleMissing);
        };

        if order.status != expected_order_status {
            return Ok(AssignmentOutcome::OrderChanged(order));
        }
        if vehicle_before.status != VehicleStatus::Available {
            return Ok(AssignmentOutcome::VehicleUnavailable(vehicle_before));
        }

        let now = Utc::now();

        // First write: vehicle.
        let mut vehicle = vehicle_before.clone();
        vehicle.status = VehicleStatus::InUse;
        vehicle.updated_at = now;
        tables.vehicles.insert(vehicle_id, vehicle.clone());

        if tables.trip(FailPoint::AssignAfterVehicleWrite) {
            tables.vehicles.insert(vehicle_id, vehicle_before);
            return Err(StoreError::Unavailable(
                "injected failure between assignment writes".to_string(),
            ));
        }

        // Second write: order.
        let mut order = order;
        order.status = OrderStatus::InTransit;
        order.vehicle_id = Some(vehicle_id);
        order.updated_at = now;
        tables.orders.insert(order_id, order.clone());

        Ok(AssignmentOutcome::Assigned { order, vehicle })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_vehicle(plate: &str) -> NewVehicle {
        NewVehicle {
            plate_number: plate.to_string(),
            model: "Actros".to_string(),
            brand: "Mercedes".to_string(),
            driver_name: None,
            fuel_level: 100,
            mileage: 0,
            last_maintenance: date(2024, 1, 1),
            next_maintenance: date(2024, 6, 1),
        }
    }

    #[tokio::test]
    async fn test_sequences_produce_padded_codes() {
        let store = MemoryStore::new();
        let draft = OrderDraft::new("Acme", date(2024, 2, 1));

        let first = OrderRepository::insert(&store, &draft).await.unwrap();
        let second = OrderRepository::insert(&store, &draft).await.unwrap();
        assert_eq!(first.order_code, "ORD-001");
        assert_eq!(second.order_code, "ORD-002");

        let vehicle = VehicleRepository::insert(&store, &new_vehicle("AB-1")).await.unwrap();
        assert_eq!(vehicle.vehicle_code, "VEH-001");
    }

    #[tokio::test]
    async fn test_status_cas_conflict_reports_current_row() {
        let store = MemoryStore::new();
        let order = OrderRepository::insert(&store, &OrderDraft::new("Acme", date(2024, 2, 1)))
            .await
            .unwrap();

        let change = StatusChange {
            expected: OrderStatus::Confirmed,
            next: OrderStatus::Processing,
            actual_delivery: None,
        };

        match store.compare_and_set_status(order.id, &change).await.unwrap() {
            CasOutcome::Conflict(current) => assert_eq!(current.status, OrderStatus::Pending),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_assignment_rolls_back_vehicle_on_injected_failure() {
        let store = MemoryStore::new();
        let order = OrderRepository::insert(&store, &OrderDraft::new("Acme", date(2024, 2, 1)))
            .await
            .unwrap();
        let vehicle = VehicleRepository::insert(&store, &new_vehicle("AB-1")).await.unwrap();

        store.arm(FailPoint::AssignAfterVehicleWrite).await;
        let result = store
            .assign_vehicle(order.id, OrderStatus::Pending, vehicle.id)
            .await;
        assert!(result.is_err());

        let vehicle_after = VehicleRepository::get(&store, vehicle.id).await.unwrap().unwrap();
        let order_after = OrderRepository::get(&store, order.id).await.unwrap().unwrap();
        assert_eq!(vehicle_after, vehicle);
        assert_eq!(order_after, order);
    }

    #[tokio::test]
    async fn test_mark_all_read_counts_flipped_rows() {
        let store = MemoryStore::new();
        let draft = NotificationDraft::new(crate::models::NotificationType::Info, "t", "m");
        let first = NotificationRepository::insert(&store, &draft).await.unwrap();
        NotificationRepository::insert(&store, &draft).await.unwrap();

        store.mark_read(first.id).await.unwrap();
        assert_eq!(store.mark_all_read().await.unwrap(), 1);
        assert!(store.list(true).await.unwrap().is_empty());
        assert_eq!(store.list(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_notification_fail_point_is_one_shot() {
        let store = MemoryStore::new();
        let draft = NotificationDraft::new(crate::models::NotificationType::Info, "t", "m");

        store.arm(FailPoint::NotificationInsert).await;
        assert!(NotificationRepository::insert(&store, &draft).await.is_err());
        assert!(NotificationRepository::insert(&store, &draft).await.is_ok());
    }
}
