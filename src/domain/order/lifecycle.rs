use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::value_objects::OrderStatus;
use crate::domain::errors::LifecycleError;
use crate::domain::vehicle::VehicleStatus;
use crate::metrics::Metrics;
use crate::models::{NotificationDraft, NotificationType, Order, OrderDraft, OrderView};
use crate::notifications::NotificationBus;
use crate::store::{AssignmentOutcome, CasOutcome, OrderFilter, Repositories, StatusChange};
use crate::utils::{retry_on_transient, RetryConfig};

// ============================================================================
// Order Lifecycle Manager
// ============================================================================
//
// Owns Order.status and Order.vehicleId. Every write is conditional on the
// state that was validated, so a concurrent change surfaces as a conflict
// and the request is re-validated against the fresh row. The loop ends
// because each conflict moves the order strictly forward on a finite graph.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrderPolicy {
    /// Target statuses that raise a notification on `update_order_status`.
    pub notify_statuses: HashSet<OrderStatus>,
    pub retry: RetryConfig,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            notify_statuses: [
                OrderStatus::InTransit,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ]
            .into_iter()
            .collect(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub total: i64,
    pub pending: i64,
    pub in_transit: i64,
    pub delivered: i64,
    pub cancelled: i64,
}

pub struct OrderLifecycleManager {
    repos: Repositories,
    bus: Arc<NotificationBus>,
    metrics: Arc<Metrics>,
    policy: OrderPolicy,
}

impl OrderLifecycleManager {
    pub fn new(
        repos: Repositories,
        bus: Arc<NotificationBus>,
        metrics: Arc<Metrics>,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            repos,
            bus,
            metrics,
            policy,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Persist a new order in `pending` under the next `ORD-###` code.
    ///
    /// Not retried: a retry after an ambiguous failure could allocate a
    /// second code for the same request.
    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, LifecycleError> {
        if draft.customer_name.trim().is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "customerName must not be blank".to_string(),
            ));
        }

        let order = self.repos.orders.insert(&draft).await?;
        info!(order_id = order.id, order_code = %order.order_code, "Order created");

        self.bus.order_changed(&order, true);
        self.bus
            .notify_after_commit(
                NotificationDraft::new(
                    NotificationType::Info,
                    "New order",
                    format!(
                        "Received new order {} from customer {}",
                        order.order_code, order.customer_name
                    ),
                )
                .for_order(order.id),
            )
            .await;

        Ok(order)
    }

    pub async fn update_order_status(
        &self,
        id: i64,
        next: OrderStatus,
    ) -> Result<OrderView, LifecycleError> {
        loop {
            let current = self
                .repos
                .orders
                .get(id)
                .await?
                .ok_or_else(|| LifecycleError::order_not_found(id))?;

            if current.status == next {
                debug!(order_id = id, status = %next, "Order already in requested status");
                return self.view(current).await;
            }

            if !current.status.can_transition_to(next) {
                return Err(LifecycleError::InvalidTransition {
                    from: current.status.to_string(),
                    to: next.to_string(),
                });
            }

            let change = StatusChange {
                expected: current.status,
                next,
                actual_delivery: (next == OrderStatus::Delivered).then(|| Utc::now().date_naive()),
            };

            let orders = &self.repos.orders;
            let change_ref = &change;
            let outcome = retry_on_transient(&self.policy.retry, "order_status", |_| {
                orders.compare_and_set_status(id, change_ref)
            })
            .await?;

            match outcome {
                CasOutcome::Applied(order) => {
                    info!(
                        order_id = id,
                        from = %current.status,
                        to = %order.status,
                        "Order status changed"
                    );
                    self.metrics.record_transition(order.status.as_str());
                    self.bus.order_changed(&order, false);

                    if self.policy.notify_statuses.contains(&order.status) {
                        self.bus.notify_after_commit(status_notification(&order)).await;
                    }
                    return self.view(order).await;
                }
                CasOutcome::Conflict(fresh) => {
                    debug!(
                        order_id = id,
                        expected = %current.status,
                        found = %fresh.status,
                        "Order changed concurrently, re-validating"
                    );
                }
                CasOutcome::Missing => return Err(LifecycleError::order_not_found(id)),
            }
        }
    }

    /// Bind an available vehicle to an order: vehicle `in_use`, order
    /// `in_transit`. Both writes land in one store unit of work.
    pub async fn assign_vehicle_to_order(
        &self,
        order_id: i64,
        vehicle_id: i64,
    ) -> Result<OrderView, LifecycleError> {
        loop {
            let order = self
                .repos
                .orders
                .get(order_id)
                .await?
                .ok_or_else(|| LifecycleError::order_not_found(order_id))?;
            let vehicle = self
                .repos
                .vehicles
                .get(vehicle_id)
                .await?
                .ok_or_else(|| LifecycleError::vehicle_not_found(vehicle_id))?;

            if vehicle.status != VehicleStatus::Available {
                self.metrics.assignment_conflicts.inc();
                return Err(LifecycleError::VehicleNotAvailable {
                    vehicle_id,
                    status: vehicle.status.to_string(),
                });
            }

            if !order.status.can_transition_to(OrderStatus::InTransit) {
                return Err(LifecycleError::InvalidTransition {
                    from: order.status.to_string(),
                    to: OrderStatus::InTransit.to_string(),
                });
            }

            let outcome = self
                .repos
                .assignments
                .assign_vehicle(order_id, order.status, vehicle_id)
                .await?;

            match outcome {
                AssignmentOutcome::Assigned { order, vehicle } => {
                    info!(
                        order_id,
                        vehicle_id,
                        order_code = %order.order_code,
                        plate = %vehicle.plate_number,
                        "Vehicle assigned to order"
                    );
                    self.metrics.record_transition(order.status.as_str());
                    self.bus.order_changed(&order, false);
                    self.bus.vehicle_changed(&vehicle, false);
                    self.bus
                        .notify_after_commit(
                            NotificationDraft::new(
                                NotificationType::Info,
                                "Order assigned",
                                format!(
                                    "Order {} assigned to vehicle {}",
                                    order.order_code, vehicle.plate_number
                                ),
                            )
                            .for_order(order.id)
                            .for_vehicle(vehicle.id),
                        )
                        .await;

                    return Ok(OrderView {
                        order,
                        vehicle: Some(vehicle),
                    });
                }
                AssignmentOutcome::OrderMissing => {
                    return Err(LifecycleError::order_not_found(order_id))
                }
                AssignmentOutcome::VehicleMissing => {
                    return Err(LifecycleError::vehicle_not_found(vehicle_id))
                }
                AssignmentOutcome::VehicleUnavailable(vehicle) => {
                    warn!(vehicle_id, status = %vehicle.status, "Vehicle taken by a concurrent assignment");
                    self.metrics.assignment_conflicts.inc();
                    return Err(LifecycleError::VehicleNotAvailable {
                        vehicle_id,
                        status: vehicle.status.to_string(),
                    });
                }
                AssignmentOutcome::OrderChanged(fresh) => {
                    debug!(
                        order_id,
                        expected = %order.status,
                        found = %fresh.status,
                        "Order changed before assignment, re-validating"
                    );
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_order(&self, id: i64) -> Result<OrderView, LifecycleError> {
        let order = self
            .repos
            .orders
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::order_not_found(id))?;
        self.view(order).await
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, LifecycleError> {
        Ok(self.repos.orders.find(filter).await?)
    }

    pub async fn statistics(&self) -> Result<OrderStatistics, LifecycleError> {
        let total = self.repos.orders.count().await?;
        let orders = self.repos.orders.find(&OrderFilter::default()).await?;
        let count = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count() as i64;

        Ok(OrderStatistics {
            total,
            pending: count(OrderStatus::Pending),
            in_transit: count(OrderStatus::InTransit),
            delivered: count(OrderStatus::Delivered),
            cancelled: count(OrderStatus::Cancelled),
        })
    }

    async fn view(&self, order: Order) -> Result<OrderView, LifecycleError> {
        let vehicle = match order.vehicle_id {
            Some(vehicle_id) => self.repos.vehicles.get(vehicle_id).await?,
            None => None,
        };
        Ok(OrderView { order, vehicle })
    }
}

fn status_notification(order: &Order) -> NotificationDraft {
    let code = &order.order_code;
    let (kind, title, message) = match order.status {
        OrderStatus::InTransit => (
            NotificationType::Info,
            "Order in transit",
            format!("Order {} is on its way", code),
        ),
        OrderStatus::Delivered => (
            NotificationType::Success,
            "Order delivered",
            format!("Order {} has been delivered", code),
        ),
        OrderStatus::Cancelled => (
            NotificationType::Info,
            "Order cancelled",
            format!("Order {} has been cancelled", code),
        ),
        other => (
            NotificationType::Info,
            "Order status changed",
            format!("Order {} is now {}", code, other),
        ),
    };

    NotificationDraft::new(kind, title, message).for_order(order.id)
}
