use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::info;

use super::{
    AssignmentOutcome, AssignmentStore, CasOutcome, NotificationRepository, OrderFilter,
    OrderRepository, StatusChange, StoreError, VehicleFilter, VehicleRepository,
};
use crate::domain::order::{order_code, OrderStatus};
use crate::domain::vehicle::{vehicle_code, VehicleStatus};
use crate::models::{
    NewVehicle, Notification, NotificationAction, NotificationDraft, NotificationMetadata, Order,
    OrderDraft, Vehicle,
};

// ============================================================================
// Postgres Store
// ============================================================================
//
// Ids come from dedicated sequences so the human-facing codes are derived
// from a value no other writer can observe twice. Conditional writes are
// expressed as `UPDATE ... WHERE <expected> RETURNING`, and assignment runs
// inside one transaction with both rows locked (orders before vehicles).
//
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE SEQUENCE IF NOT EXISTS order_code_seq",
    "CREATE SEQUENCE IF NOT EXISTS vehicle_code_seq",
    "CREATE SEQUENCE IF NOT EXISTS notification_seq",
    r#"
    CREATE TABLE IF NOT EXISTS vehicles (
        id               BIGINT PRIMARY KEY,
        vehicle_code     TEXT NOT NULL UNIQUE,
        plate_number     TEXT NOT NULL,
        model            TEXT NOT NULL,
        brand            TEXT NOT NULL,
        status           TEXT NOT NULL,
        driver_name      TEXT,
        fuel_level       INTEGER NOT NULL CHECK (fuel_level BETWEEN 0 AND 100),
        mileage          BIGINT NOT NULL,
        last_maintenance DATE NOT NULL,
        next_maintenance DATE NOT NULL,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at       TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id                 BIGINT PRIMARY KEY,
        order_code         TEXT NOT NULL UNIQUE,
        status             TEXT NOT NULL,
        priority           TEXT NOT NULL,
        customer_name      TEXT NOT NULL,
        destination        TEXT NOT NULL,
        vehicle_id         BIGINT REFERENCES vehicles(id),
        estimated_delivery DATE NOT NULL,
        actual_delivery    DATE,
        total_amount       NUMERIC(12, 2),
        delivery_cost      NUMERIC(12, 2),
        notes              TEXT,
        created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at         TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id         BIGINT PRIMARY KEY,
        kind       TEXT NOT NULL,
        title      TEXT NOT NULL,
        message    TEXT NOT NULL,
        read       BOOLEAN NOT NULL DEFAULT false,
        action     JSONB,
        metadata   JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS orders_status_idx ON orders (status)",
    "CREATE INDEX IF NOT EXISTS vehicles_status_idx ON vehicles (status)",
    "CREATE INDEX IF NOT EXISTS notifications_unread_idx ON notifications (read) WHERE NOT read",
];

const ORDER_COLUMNS: &str = "id, order_code, status, priority, customer_name, destination, \
     vehicle_id, estimated_delivery, actual_delivery, total_amount, delivery_cost, notes, \
     created_at, updated_at";

const VEHICLE_COLUMNS: &str = "id, vehicle_code, plate_number, model, brand, status, \
     driver_name, fuel_level, mileage, last_maintenance, next_maintenance, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, kind, title, message, read, action, metadata, created_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create sequences, tables and indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Postgres schema ready");
        Ok(())
    }

    async fn next_id(&self, sequence: &str) -> Result<i64, StoreError> {
        let row = sqlx::query(&format!("SELECT nextval('{}')", sequence))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(StoreError::Corrupt)
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    Ok(Order {
        id: row.try_get("id")?,
        order_code: row.try_get("order_code")?,
        status: parse_column(row, "status")?,
        priority: parse_column(row, "priority")?,
        customer_name: row.try_get("customer_name")?,
        destination: row.try_get("destination")?,
        vehicle_id: row.try_get("vehicle_id")?,
        estimated_delivery: row.try_get("estimated_delivery")?,
        actual_delivery: row.try_get("actual_delivery")?,
        total_amount: row.try_get("total_amount")?,
        delivery_cost: row.try_get("delivery_cost")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn vehicle_from_row(row: &PgRow) -> Result<Vehicle, StoreError> {
    Ok(Vehicle {
        id: row.try_get("id")?,
        vehicle_code: row.try_get("vehicle_code")?,
        plate_number: row.try_get("plate_number")?,
        model: row.try_get("model")?,
        brand: row.try_get("brand")?,
        status: parse_column(row, "status")?,
        driver_name: row.try_get("driver_name")?,
        fuel_level: row.try_get("fuel_level")?,
        mileage: row.try_get("mileage")?,
        last_maintenance: row.try_get("last_maintenance")?,
        next_maintenance: row.try_get("next_maintenance")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> Result<Notification, StoreError> {
    let action: Option<Json<NotificationAction>> = row.try_get("action")?;
    let metadata: Option<Json<NotificationMetadata>> = row.try_get("metadata")?;

    Ok(Notification {
        id: row.try_get("id")?,
        kind: parse_column(row, "kind")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        read: row.try_get("read")?,
        action: action.map(|Json(a)| a),
        metadata: metadata.map(|Json(m)| m),
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
impl OrderRepository for PgStore {
    async fn get(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn insert(&self, draft: &OrderDraft) -> Result<Order, StoreError> {
        let id = self.next_id("order_code_seq").await?;

        let row = sqlx::query(&format!(
            "INSERT INTO orders (id, order_code, status, priority, customer_name, destination, \
             estimated_delivery, total_amount, delivery_cost, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(order_code(id))
        .bind(OrderStatus::Pending.as_str())
        .bind(draft.priority.as_str())
        .bind(&draft.customer_name)
        .bind(&draft.destination)
        .bind(draft.estimated_delivery)
        .bind(draft.total_amount)
        .bind(draft.delivery_cost)
        .bind(&draft.notes)
        .fetch_one(&self.pool)
        .await?;

        order_from_row(&row)
    }

    async fn find(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders \
             WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR priority = $2) \
             ORDER BY created_at DESC, id DESC",
            ORDER_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT count(*)::bigint FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<CasOutcome<Order>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2, actual_delivery = COALESCE($3, actual_delivery), \
             updated_at = now() WHERE id = $1 AND status = $4 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(change.next.as_str())
        .bind(change.actual_delivery)
        .bind(change.expected.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(CasOutcome::Applied(order_from_row(&row)?)),
            None => Ok(match OrderRepository::get(self, id).await? {
                Some(current) => CasOutcome::Conflict(current),
                None => CasOutcome::Missing,
            }),
        }
    }
}

// ============================================================================
// Vehicles
// ============================================================================

#[async_trait]
impl VehicleRepository for PgStore {
    async fn get(&self, id: i64) -> Result<Option<Vehicle>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM vehicles WHERE id = $1", VEHICLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(vehicle_from_row).transpose()
    }

    async fn insert(&self, new: &NewVehicle) -> Result<Vehicle, StoreError> {
        let id = self.next_id("vehicle_code_seq").await?;

        let row = sqlx::query(&format!(
            "INSERT INTO vehicles (id, vehicle_code, plate_number, model, brand, status, \
             driver_name, fuel_level, mileage, last_maintenance, next_maintenance) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(vehicle_code(id))
        .bind(&new.plate_number)
        .bind(&new.model)
        .bind(&new.brand)
        .bind(VehicleStatus::Available.as_str())
        .bind(&new.driver_name)
        .bind(new.fuel_level)
        .bind(new.mileage)
        .bind(new.last_maintenance)
        .bind(new.next_maintenance)
        .fetch_one(&self.pool)
        .await?;

        vehicle_from_row(&row)
    }

    async fn find(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM vehicles WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC",
            VEHICLE_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(vehicle_from_row).collect()
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT count(*)::bigint FROM vehicles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn set_status(&self, id: i64, status: VehicleStatus) -> Result<Option<Vehicle>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE vehicles SET status = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(vehicle_from_row).transpose()
    }

    async fn set_fuel_level(&self, id: i64, level: i32) -> Result<Option<Vehicle>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE vehicles SET fuel_level = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(level)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(vehicle_from_row).transpose()
    }

    async fn compare_and_set_mileage(
        &self,
        id: i64,
        expected: i64,
        next: i64,
    ) -> Result<CasOutcome<Vehicle>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE vehicles SET mileage = $2, updated_at = now() \
             WHERE id = $1 AND mileage = $3 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(next)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(CasOutcome::Applied(vehicle_from_row(&row)?)),
            None => Ok(match VehicleRepository::get(self, id).await? {
                Some(current) => CasOutcome::Conflict(current),
                None => CasOutcome::Missing,
            }),
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, StoreError> {
        let id = self.next_id("notification_seq").await?;

        let row = sqlx::query(&format!(
            "INSERT INTO notifications (id, kind, title, message, action, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(draft.kind.as_str())
        .bind(&draft.title)
        .bind(&draft.message)
        .bind(draft.action.clone().map(Json))
        .bind(draft.metadata.clone().map(Json))
        .fetch_one(&self.pool)
        .await?;

        notification_from_row(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = $1",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list(&self, unread_only: bool) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE NOT ($1 AND read) \
             ORDER BY created_at DESC, id DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE notifications SET read = true WHERE id = $1 RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn mark_all_read(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE notifications SET read = true WHERE NOT read")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Assignment
// ============================================================================

#[async_trait]
impl AssignmentStore for PgStore {
    async fn assign_vehicle(
        &self,
        order_id: i64,
        expected_order_status: OrderStatus,
        vehicle_id: i64,
    ) -> Result<AssignmentOutcome, StoreError> {
        // Dropping `tx` without commit rolls back.
        let mut tx = self.pool.begin().await?;

        let order_row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(order) = order_row.as_ref().map(order_from_row).transpose()? else {
            return Ok(AssignmentOutcome::OrderMissing);
        };

        let vehicle_row = sqlx::query(&format!(
            "SELECT {} FROM vehicles WHERE id = $1 FOR UPDATE",
            VEHICLE_COLUMNS
        ))
        .bind(vehicle_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(vehicle) = vehicle_row.as_ref().map(vehicle_from_row).transpose()? else {
            return Ok(AssignmentOutcome::VehicleMissing);
        };

        if order.status != expected_order_status {
            return Ok(AssignmentOutcome::OrderChanged(order));
        }
        if vehicle.status != VehicleStatus::Available {
            return Ok(AssignmentOutcome::VehicleUnavailable(vehicle));
        }

        let vehicle_row = sqlx::query(&format!(
            "UPDATE vehicles SET status = $2, updated_at = now() \
             WHERE id = $1 AND status = $3 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(vehicle_id)
        .bind(VehicleStatus::InUse.as_str())
        .bind(VehicleStatus::Available.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let order_row = sqlx::query(&format!(
            "UPDATE orders SET status = $2, vehicle_id = $3, updated_at = now() \
             WHERE id = $1 AND status = $4 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(OrderStatus::InTransit.as_str())
        .bind(vehicle_id)
        .bind(expected_order_status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let vehicle = vehicle_from_row(&vehicle_row)?;
        let order = order_from_row(&order_row)?;
        tx.commit().await?;

        Ok(AssignmentOutcome::Assigned { order, vehicle })
    }
}
