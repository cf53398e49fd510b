use chrono::NaiveDate;
use std::sync::Arc;

use super::order::{OrderLifecycleManager, OrderPolicy};
use super::vehicle::{AlertThresholds, MaintenanceScanner, VehicleLifecycleManager};
use crate::metrics::Metrics;
use crate::models::{Notification, OrderDraft, VehicleDraft};
use crate::notifications::{NotificationBus, PushHub, TopicHub};
use crate::store::{MemoryStore, NotificationRepository, Repositories};
use crate::utils::RetryConfig;

/// Fully wired managers over a fresh memory store.
pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub metrics: Arc<Metrics>,
    pub bus: Arc<NotificationBus>,
    pub orders: Arc<OrderLifecycleManager>,
    pub vehicles: Arc<VehicleLifecycleManager>,
    pub scanner: Arc<MaintenanceScanner>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::memory(store.clone());
        let metrics = Arc::new(Metrics::new().unwrap());
        let bus = Arc::new(NotificationBus::new(
            repos.notifications.clone(),
            Arc::new(TopicHub::new(64)),
            Arc::new(PushHub::new(64)),
            metrics.clone(),
        ));
        let thresholds = AlertThresholds::default();

        let orders = Arc::new(OrderLifecycleManager::new(
            repos.clone(),
            bus.clone(),
            metrics.clone(),
            OrderPolicy::default(),
        ));
        let vehicles = Arc::new(VehicleLifecycleManager::new(
            repos.clone(),
            bus.clone(),
            metrics.clone(),
            thresholds,
            RetryConfig::none(),
        ));
        let scanner = Arc::new(MaintenanceScanner::new(
            repos.vehicles.clone(),
            bus.clone(),
            metrics.clone(),
            thresholds.maintenance_window_days,
        ));

        Self {
            store,
            metrics,
            bus,
            orders,
            vehicles,
            scanner,
        }
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Orders 1..=n, all `pending`.
    pub async fn seed_orders(&self, n: usize) {
        for i in 1..=n {
            self.orders
                .create_order(OrderDraft::new(format!("Customer {}", i), Self::date(2024, 2, 1)))
                .await
                .unwrap();
        }
    }

    /// Vehicles 1..=n, `available`, plates `PLATE-<i>`, maintenance far out.
    pub async fn seed_vehicles(&self, n: usize) {
        for i in 1..=n {
            self.vehicles
                .create_vehicle(VehicleDraft::new(format!("PLATE-{}", i), Self::date(2099, 1, 1)))
                .await
                .unwrap();
        }
    }

    /// Persisted notifications, newest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.store.list(false).await.unwrap()
    }
}
