use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::order::{OrderPriority, OrderStatus};
use crate::domain::vehicle::VehicleStatus;

// ============================================================================
// Persisted Records
// ============================================================================
//
// Wire names follow the dashboard contract (camelCase). The numeric `id` is
// storage-assigned; `orderId` / `vehicleId` on the root record is the
// human-facing code.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    #[serde(rename = "orderId")]
    pub order_code: String,
    pub status: OrderStatus,
    pub priority: OrderPriority,
    pub customer_name: String,
    pub destination: String,
    pub vehicle_id: Option<i64>,
    pub estimated_delivery: NaiveDate,
    pub actual_delivery: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub delivery_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order with its vehicle relation populated.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub vehicle: Option<Vehicle>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: i64,
    #[serde(rename = "vehicleId")]
    pub vehicle_code: String,
    pub plate_number: String,
    pub model: String,
    pub brand: String,
    pub status: VehicleStatus,
    pub driver_name: Option<String>,
    pub fuel_level: i32,
    pub mileage: i64,
    pub last_maintenance: NaiveDate,
    pub next_maintenance: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Drafts - caller input for creation
// ============================================================================

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub customer_name: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub priority: OrderPriority,
    pub estimated_delivery: NaiveDate,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub delivery_cost: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OrderDraft {
    pub fn new(customer_name: impl Into<String>, estimated_delivery: NaiveDate) -> Self {
        Self {
            customer_name: customer_name.into(),
            destination: String::new(),
            priority: OrderPriority::default(),
            estimated_delivery,
            total_amount: None,
            delivery_cost: None,
            notes: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDraft {
    pub plate_number: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub fuel_level: Option<i32>,
    #[serde(default)]
    pub mileage: Option<i64>,
    pub next_maintenance: NaiveDate,
}

impl VehicleDraft {
    pub fn new(plate_number: impl Into<String>, next_maintenance: NaiveDate) -> Self {
        Self {
            plate_number: plate_number.into(),
            model: String::new(),
            brand: String::new(),
            driver_name: None,
            fuel_level: None,
            mileage: None,
            next_maintenance,
        }
    }
}

/// Fully-resolved vehicle row handed to the store; defaults already applied.
#[derive(Clone, Debug)]
pub struct NewVehicle {
    pub plate_number: String,
    pub model: String,
    pub brand: String,
    pub driver_name: Option<String>,
    pub fuel_level: i32,
    pub mileage: i64,
    pub last_maintenance: NaiveDate,
    pub next_maintenance: NaiveDate,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationType::Info),
            "success" => Ok(NotificationType::Success),
            "warning" => Ok(NotificationType::Warning),
            "error" => Ok(NotificationType::Error),
            other => Err(format!("unknown notification type: {}", other)),
        }
    }
}

/// Call-to-action attached to a notification.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// Persisted notification. Only `read` changes after creation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NotificationAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NotificationMetadata>,
    pub created_at: DateTime<Utc>,
}

/// Notification content before the store assigns `id` and `createdAt`.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationDraft {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action: Option<NotificationAction>,
    #[serde(default)]
    pub metadata: Option<NotificationMetadata>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            action: None,
            metadata: None,
        }
    }

    /// Attach an order reference to both the action and the metadata.
    pub fn for_order(mut self, order_id: i64) -> Self {
        self.action = Some(NotificationAction {
            text: "View order".to_string(),
            order_id: Some(order_id),
            ..self.action.unwrap_or_default()
        });
        self.metadata = Some(NotificationMetadata {
            order_id: Some(order_id),
            ..self.metadata.unwrap_or_default()
        });
        self
    }

    /// Attach a vehicle reference. Keeps an existing call-to-action label.
    pub fn for_vehicle(mut self, vehicle_id: i64) -> Self {
        let action = self.action.take().unwrap_or_default();
        let text = if action.text.is_empty() {
            "View vehicle".to_string()
        } else {
            action.text.clone()
        };
        self.action = Some(NotificationAction {
            text,
            vehicle_id: Some(vehicle_id),
            ..action
        });
        self.metadata = Some(NotificationMetadata {
            vehicle_id: Some(vehicle_id),
            ..self.metadata.unwrap_or_default()
        });
        self
    }
}
