use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::domain::errors::LifecycleError;
use crate::metrics::Metrics;
use crate::models::{NotificationDraft, NotificationType, Vehicle};
use crate::notifications::NotificationBus;
use crate::store::{VehicleFilter, VehicleRepository};

// ============================================================================
// Maintenance Scanner
// ============================================================================
//
// Read-then-notify pass over the whole fleet. No "last notified" marker is
// kept: a vehicle stays in the result, and is notified again, on every scan
// until its next maintenance date moves out of the window.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceDue {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    /// Negative when overdue.
    pub days_remaining: i64,
}

pub struct MaintenanceScanner {
    vehicles: Arc<dyn VehicleRepository>,
    bus: Arc<NotificationBus>,
    metrics: Arc<Metrics>,
    window_days: i64,
}

impl MaintenanceScanner {
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        bus: Arc<NotificationBus>,
        metrics: Arc<Metrics>,
        window_days: i64,
    ) -> Self {
        Self {
            vehicles,
            bus,
            metrics,
            window_days,
        }
    }

    pub async fn scan(&self) -> Result<Vec<MaintenanceDue>, LifecycleError> {
        self.scan_at(Utc::now().date_naive()).await
    }

    pub async fn scan_at(&self, today: NaiveDate) -> Result<Vec<MaintenanceDue>, LifecycleError> {
        let timer = self.metrics.maintenance_scan_duration.start_timer();
        let fleet = self.vehicles.find(&VehicleFilter::default()).await?;

        let mut due = Vec::new();
        for vehicle in fleet {
            let days_remaining = (vehicle.next_maintenance - today).num_days();
            if days_remaining > self.window_days {
                continue;
            }

            self.metrics.record_alert("maintenance_due");
            self.bus
                .notify_after_commit(
                    NotificationDraft::new(
                        NotificationType::Warning,
                        "Maintenance due",
                        due_message(&vehicle.plate_number, days_remaining),
                    )
                    .for_vehicle(vehicle.id),
                )
                .await;

            due.push(MaintenanceDue {
                vehicle,
                days_remaining,
            });
        }

        timer.observe_duration();
        info!(
            window_days = self.window_days,
            due = due.len(),
            "Maintenance scan finished"
        );
        Ok(due)
    }
}

fn due_message(plate: &str, days_remaining: i64) -> String {
    match days_remaining {
        d if d < 0 => format!("Vehicle {} is {} days overdue for maintenance", plate, -d),
        0 => format!("Vehicle {} is due for maintenance today", plate),
        1 => format!("Vehicle {} is due for maintenance in 1 day", plate),
        d => format!("Vehicle {} is due for maintenance in {} days", plate, d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testkit::Harness;
    use crate::models::VehicleDraft;

    async fn vehicle_due(h: &Harness, plate: &str, next: NaiveDate) -> Vehicle {
        h.vehicles
            .create_vehicle(VehicleDraft::new(plate, next))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_scan_picks_vehicles_inside_window() {
        let h = Harness::new();
        let today = Harness::date(2024, 3, 1);
        let soon = vehicle_due(&h, "SOON", Harness::date(2024, 3, 8)).await;
        let overdue = vehicle_due(&h, "LATE", Harness::date(2024, 2, 27)).await;
        vehicle_due(&h, "LATER", Harness::date(2024, 3, 9)).await;

        let due = h.scanner.scan_at(today).await.unwrap();
        let mut found: Vec<(i64, i64)> = due.iter().map(|d| (d.vehicle.id, d.days_remaining)).collect();
        found.sort();
        assert_eq!(found, vec![(soon.id, 7), (overdue.id, -3)]);

        let warnings: Vec<_> = h
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.title == "Maintenance due")
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|n| n.message.contains("in 7 days")));
        assert!(warnings.iter().any(|n| n.message.contains("3 days overdue")));
    }

    #[tokio::test]
    async fn test_repeated_scan_notifies_again() {
        let h = Harness::new();
        let today = Harness::date(2024, 3, 1);
        vehicle_due(&h, "SOON", Harness::date(2024, 3, 2)).await;

        h.scanner.scan_at(today).await.unwrap();
        h.scanner.scan_at(today).await.unwrap();

        let count = h
            .notifications()
            .await
            .iter()
            .filter(|n| n.title == "Maintenance due")
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_due_message_wording() {
        assert_eq!(due_message("X", 0), "Vehicle X is due for maintenance today");
        assert_eq!(due_message("X", 1), "Vehicle X is due for maintenance in 1 day");
    }
}
