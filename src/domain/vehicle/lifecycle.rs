use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::value_objects::VehicleStatus;
use crate::domain::errors::LifecycleError;
use crate::metrics::Metrics;
use crate::models::{NewVehicle, NotificationDraft, NotificationType, Vehicle, VehicleDraft};
use crate::notifications::NotificationBus;
use crate::store::{CasOutcome, Repositories, VehicleFilter};
use crate::utils::{retry_on_transient, RetryConfig};

// ============================================================================
// Vehicle Lifecycle Manager
// ============================================================================
//
// Owns Vehicle.status outside assignment plus the telemetry-like fields
// (fuel level, mileage). Threshold crossings raise a warning through the
// bus after the write has landed.
//
// ============================================================================

/// Alert thresholds. Fuel is a strict `<`, mileage a strict `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    pub low_fuel: i32,
    pub service_mileage_km: i64,
    pub maintenance_window_days: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_fuel: 20,
            service_mileage_km: 10_000,
            maintenance_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStatistics {
    pub total: i64,
    pub available: i64,
    pub in_use: i64,
    pub maintenance: i64,
    pub out_of_service: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUtilization {
    pub total: i64,
    pub in_use: i64,
    pub maintenance: i64,
    /// Percentage of the fleet that is engaged or in maintenance.
    pub utilization_rate: f64,
}

pub struct VehicleLifecycleManager {
    repos: Repositories,
    bus: Arc<NotificationBus>,
    metrics: Arc<Metrics>,
    thresholds: AlertThresholds,
    retry: RetryConfig,
}

impl VehicleLifecycleManager {
    pub fn new(
        repos: Repositories,
        bus: Arc<NotificationBus>,
        metrics: Arc<Metrics>,
        thresholds: AlertThresholds,
        retry: RetryConfig,
    ) -> Self {
        Self {
            repos,
            bus,
            metrics,
            thresholds,
            retry,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub async fn create_vehicle(&self, draft: VehicleDraft) -> Result<Vehicle, LifecycleError> {
        if draft.plate_number.trim().is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "plateNumber must not be blank".to_string(),
            ));
        }

        let fuel_level = draft.fuel_level.unwrap_or(100);
        validate_fuel_level(fuel_level)?;

        let mileage = draft.mileage.unwrap_or(0);
        if mileage < 0 {
            return Err(LifecycleError::InvalidArgument(format!(
                "mileage must not be negative, got {}",
                mileage
            )));
        }

        let new_vehicle = NewVehicle {
            plate_number: draft.plate_number,
            model: draft.model,
            brand: draft.brand,
            driver_name: draft.driver_name,
            fuel_level,
            mileage,
            last_maintenance: Utc::now().date_naive(),
            next_maintenance: draft.next_maintenance,
        };

        let vehicle = self.repos.vehicles.insert(&new_vehicle).await?;
        info!(
            vehicle_id = vehicle.id,
            vehicle_code = %vehicle.vehicle_code,
            plate = %vehicle.plate_number,
            "Vehicle created"
        );

        self.bus.vehicle_changed(&vehicle, true);
        self.bus
            .notify_after_commit(
                NotificationDraft::new(
                    NotificationType::Info,
                    "New vehicle",
                    format!("{} ({})", vehicle.plate_number, vehicle.model),
                )
                .for_vehicle(vehicle.id),
            )
            .await;

        Ok(vehicle)
    }

    pub async fn update_vehicle_status(
        &self,
        id: i64,
        status: VehicleStatus,
    ) -> Result<Vehicle, LifecycleError> {
        let current = self
            .repos
            .vehicles
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::vehicle_not_found(id))?;

        // in_use and its sub-states are entered through order assignment only
        if status.is_engaged() && !current.status.is_engaged() {
            return Err(LifecycleError::InvalidArgument(format!(
                "vehicle {} is {}; only an order assignment can put it {}",
                current.plate_number, current.status, status
            )));
        }

        let vehicles = &self.repos.vehicles;
        let vehicle = retry_on_transient(&self.retry, "vehicle_status", |_| {
            vehicles.set_status(id, status)
        })
        .await?
        .ok_or_else(|| LifecycleError::vehicle_not_found(id))?;

        info!(vehicle_id = id, status = %status, "Vehicle status changed");
        self.bus.vehicle_changed(&vehicle, false);

        let kind = match status {
            VehicleStatus::Available => NotificationType::Success,
            VehicleStatus::OutOfService => NotificationType::Error,
            _ => NotificationType::Warning,
        };
        self.bus
            .notify_after_commit(
                NotificationDraft::new(
                    kind,
                    status.label(),
                    format!("Vehicle {} is now {}", vehicle.plate_number, status),
                )
                .for_vehicle(vehicle.id),
            )
            .await;

        Ok(vehicle)
    }

    pub async fn update_fuel_level(&self, id: i64, level: i32) -> Result<Vehicle, LifecycleError> {
        validate_fuel_level(level)?;

        let vehicles = &self.repos.vehicles;
        let vehicle = retry_on_transient(&self.retry, "vehicle_fuel", |_| {
            vehicles.set_fuel_level(id, level)
        })
        .await?
        .ok_or_else(|| LifecycleError::vehicle_not_found(id))?;

        debug!(vehicle_id = id, fuel_level = level, "Fuel level updated");
        self.bus.vehicle_changed(&vehicle, false);

        if level < self.thresholds.low_fuel {
            warn!(vehicle_id = id, fuel_level = level, "Low fuel level");
            self.metrics.record_alert("low_fuel");
            self.bus
                .notify_after_commit(
                    NotificationDraft::new(
                        NotificationType::Warning,
                        "Low fuel level",
                        format!(
                            "Vehicle {} is at {}% fuel",
                            vehicle.plate_number, level
                        ),
                    )
                    .for_vehicle(vehicle.id),
                )
                .await;
        }

        Ok(vehicle)
    }

    /// Record a new odometer reading. Readings never go backwards; the
    /// alert delta is measured against the reading actually replaced.
    pub async fn update_mileage(&self, id: i64, mileage: i64) -> Result<Vehicle, LifecycleError> {
        loop {
            let current = self
                .repos
                .vehicles
                .get(id)
                .await?
                .ok_or_else(|| LifecycleError::vehicle_not_found(id))?;

            if mileage < current.mileage {
                return Err(LifecycleError::InvalidArgument(format!(
                    "mileage must not decrease (current {}, requested {})",
                    current.mileage, mileage
                )));
            }

            let vehicles = &self.repos.vehicles;
            let previous = current.mileage;
            let outcome = retry_on_transient(&self.retry, "vehicle_mileage", |_| {
                vehicles.compare_and_set_mileage(id, previous, mileage)
            })
            .await?;

            let vehicle = match outcome {
                CasOutcome::Applied(vehicle) => vehicle,
                CasOutcome::Conflict(fresh) => {
                    debug!(
                        vehicle_id = id,
                        expected = previous,
                        found = fresh.mileage,
                        "Mileage changed concurrently, re-reading"
                    );
                    continue;
                }
                CasOutcome::Missing => return Err(LifecycleError::vehicle_not_found(id)),
            };

            let driven = mileage - previous;
            debug!(vehicle_id = id, mileage, driven, "Mileage updated");
            self.bus.vehicle_changed(&vehicle, false);

            if driven > self.thresholds.service_mileage_km {
                warn!(vehicle_id = id, driven, "Mileage jump requires maintenance");
                self.metrics.record_alert("service_mileage");
                self.bus
                    .notify_after_commit(
                        NotificationDraft::new(
                            NotificationType::Warning,
                            "Maintenance required",
                            format!(
                                "Vehicle {} has covered {} km since the last reading",
                                vehicle.plate_number, driven
                            ),
                        )
                        .for_vehicle(vehicle.id),
                    )
                    .await;
            }

            return Ok(vehicle);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_vehicle(&self, id: i64) -> Result<Vehicle, LifecycleError> {
        self.repos
            .vehicles
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::vehicle_not_found(id))
    }

    pub async fn list_vehicles(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>, LifecycleError> {
        Ok(self.repos.vehicles.find(filter).await?)
    }

    pub async fn available_vehicles(&self) -> Result<Vec<Vehicle>, LifecycleError> {
        self.list_vehicles(&VehicleFilter {
            status: Some(VehicleStatus::Available),
        })
        .await
    }

    pub async fn statistics(&self) -> Result<VehicleStatistics, LifecycleError> {
        let total = self.repos.vehicles.count().await?;
        let fleet = self.repos.vehicles.find(&VehicleFilter::default()).await?;
        let count = |status: VehicleStatus| fleet.iter().filter(|v| v.status == status).count() as i64;

        Ok(VehicleStatistics {
            total,
            available: count(VehicleStatus::Available),
            in_use: count(VehicleStatus::InUse),
            maintenance: count(VehicleStatus::Maintenance),
            out_of_service: count(VehicleStatus::OutOfService),
        })
    }

    pub async fn utilization(&self) -> Result<VehicleUtilization, LifecycleError> {
        let fleet = self.repos.vehicles.find(&VehicleFilter::default()).await?;
        let total = fleet.len() as i64;
        let in_use = fleet.iter().filter(|v| v.status.is_engaged()).count() as i64;
        let maintenance = fleet
            .iter()
            .filter(|v| v.status == VehicleStatus::Maintenance)
            .count() as i64;

        let utilization_rate = if total == 0 {
            0.0
        } else {
            (in_use + maintenance) as f64 / total as f64 * 100.0
        };

        Ok(VehicleUtilization {
            total,
            in_use,
            maintenance,
            utilization_rate,
        })
    }
}

fn validate_fuel_level(level: i32) -> Result<(), LifecycleError> {
    if (0..=100).contains(&level) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidArgument(format!(
            "fuelLevel must be within 0..=100, got {}",
            level
        )))
    }
}
