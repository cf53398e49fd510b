use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::vehicle::MaintenanceScanner;

// ============================================================================
// Maintenance Schedule Actor
// ============================================================================
//
// Drives the maintenance scanner from an actor timer. A tick is skipped
// while the previous scan is still running, so scans never overlap.
//
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub runs: u64,
    pub failures: u64,
    pub last_due: Option<usize>,
    pub last_run_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "ScanStatus")]
pub struct GetScanStatus;

// ============================================================================
// Actor
// ============================================================================

pub struct MaintenanceScheduleActor {
    scanner: Arc<MaintenanceScanner>,
    interval: Duration,
    in_flight: bool,
    status: ScanStatus,
}

impl MaintenanceScheduleActor {
    pub fn new(scanner: Arc<MaintenanceScanner>, interval: Duration) -> Self {
        Self {
            scanner,
            interval,
            in_flight: false,
            status: ScanStatus::default(),
        }
    }

    fn run_scan(&mut self, ctx: &mut Context<Self>) {
        if self.in_flight {
            tracing::debug!("Maintenance scan still running, skipping tick");
            return;
        }
        self.in_flight = true;

        let scanner = self.scanner.clone();
        ctx.spawn(
            async move { scanner.scan().await }
                .into_actor(self)
                .map(|result, act, _ctx| {
                    act.in_flight = false;
                    act.status.runs += 1;
                    act.status.last_run_at = Some(Utc::now());
                    match result {
                        Ok(due) => act.status.last_due = Some(due.len()),
                        Err(e) => {
                            act.status.failures += 1;
                            tracing::error!(error = %e, "Scheduled maintenance scan failed");
                        }
                    }
                }),
        );
    }
}

impl Actor for MaintenanceScheduleActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "MaintenanceScheduleActor started"
        );

        ctx.run_interval(self.interval, |act, ctx| act.run_scan(ctx));
    }
}

impl Handler<GetScanStatus> for MaintenanceScheduleActor {
    type Result = MessageResult<GetScanStatus>;

    fn handle(&mut self, _msg: GetScanStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testkit::Harness;
    use crate::models::VehicleDraft;

    #[actix::test]
    async fn test_timer_runs_scan_and_records_status() {
        let h = Harness::new();
        h.vehicles
            .create_vehicle(VehicleDraft::new("DUE", Utc::now().date_naive()))
            .await
            .unwrap();

        let addr = MaintenanceScheduleActor::new(h.scanner.clone(), Duration::from_millis(20)).start();

        let mut status = ScanStatus::default();
        for _ in 0..50 {
            status = addr.send(GetScanStatus).await.unwrap();
            if status.runs > 0 {
                break;
            }
            actix::clock::sleep(Duration::from_millis(10)).await;
        }

        assert!(status.runs >= 1);
        assert_eq!(status.last_due, Some(1));
        assert_eq!(status.failures, 0);
    }
}
