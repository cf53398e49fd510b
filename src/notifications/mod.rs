// ============================================================================
// Notification Bus
// ============================================================================
//
// The only way state changes leave the process. `notify` persists a
// notification row and then hands the identical serialized record to both
// live channels:
// - TopicHub - subscription channel, keyed by topic
// - PushHub  - connected real-time clients, keyed by event name
//
// Entity updates take the same fan-out path without persistence. Live
// delivery is best-effort; only the persisted row is durable.
//
// ============================================================================

mod inbox;
mod push;
mod topics;

pub use inbox::NotificationInbox;
pub use push::{BroadcastReport, PushFrame, PushHub};
pub use topics::TopicHub;

use serde::Serialize;
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::models::{Notification, NotificationDraft, Order, Vehicle};
use crate::store::{NotificationRepository, StoreError};

/// Subscription topics.
pub mod topic {
    pub const NOTIFICATION_CREATED: &str = "NOTIFICATION_CREATED";
    pub const ORDER_UPDATED: &str = "ORDER_UPDATED";
    pub const VEHICLE_UPDATED: &str = "VEHICLE_UPDATED";

    pub const ALL: [&str; 3] = [NOTIFICATION_CREATED, ORDER_UPDATED, VEHICLE_UPDATED];

    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Push transport event names.
pub mod event {
    pub const NOTIFICATION_CREATED: &str = "notificationCreated";
    pub const ORDER_CREATED: &str = "orderCreated";
    pub const ORDER_UPDATED: &str = "orderUpdated";
    pub const VEHICLE_CREATED: &str = "vehicleCreated";
    pub const VEHICLE_UPDATED: &str = "vehicleUpdated";
}

pub struct NotificationBus {
    notifications: Arc<dyn NotificationRepository>,
    topics: Arc<TopicHub>,
    push: Arc<PushHub>,
    metrics: Arc<Metrics>,
}

impl NotificationBus {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        topics: Arc<TopicHub>,
        push: Arc<PushHub>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            notifications,
            topics,
            push,
            metrics,
        }
    }

    pub fn topics(&self) -> &Arc<TopicHub> {
        &self.topics
    }

    pub fn push(&self) -> &Arc<PushHub> {
        &self.push
    }

    /// Persist, then broadcast. Nothing is broadcast if the write fails.
    pub async fn notify(&self, draft: NotificationDraft) -> Result<Notification, StoreError> {
        let notification = match self.notifications.insert(&draft).await {
            Ok(notification) => notification,
            Err(e) => {
                self.metrics.notification_persist_failures.inc();
                return Err(e);
            }
        };

        self.metrics.record_notification(notification.kind.as_str());
        tracing::info!(
            notification_id = notification.id,
            kind = notification.kind.as_str(),
            title = %notification.title,
            "Notification persisted"
        );

        self.fan_out(topic::NOTIFICATION_CREATED, event::NOTIFICATION_CREATED, &notification);
        Ok(notification)
    }

    /// `notify` for callers whose own write already succeeded: a failure is
    /// logged and counted, never returned.
    pub async fn notify_after_commit(&self, draft: NotificationDraft) -> Option<Notification> {
        match self.notify(draft).await {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist notification");
                None
            }
        }
    }

    pub fn order_changed(&self, order: &Order, created: bool) {
        let push_event = if created { event::ORDER_CREATED } else { event::ORDER_UPDATED };
        self.fan_out(topic::ORDER_UPDATED, push_event, order);
    }

    pub fn vehicle_changed(&self, vehicle: &Vehicle, created: bool) {
        let push_event = if created { event::VEHICLE_CREATED } else { event::VEHICLE_UPDATED };
        self.fan_out(topic::VEHICLE_UPDATED, push_event, vehicle);
    }

    /// Close both live channels.
    pub fn shutdown(&self) {
        self.topics.close();
        self.push.close();
        self.metrics.push_clients.set(0);
    }

    fn fan_out<T: Serialize>(&self, topic: &str, push_event: &str, payload: &T) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(topic, error = %e, "Failed to serialize live payload");
                return;
            }
        };

        let subscribers = self.topics.publish(topic, Arc::new(value.clone()));
        self.metrics.record_delivery("subscription", subscribers as u64, 0);

        let report = self.push.broadcast(push_event, value);
        self.metrics.record_delivery("push", report.delivered, report.dropped);
        if report.disconnected > 0 {
            self.metrics.push_clients.set(self.push.client_count() as i64);
        }

        tracing::debug!(
            topic,
            push_event,
            subscribers,
            push_delivered = report.delivered,
            push_dropped = report.dropped,
            "Live fan-out"
        );
    }
}
