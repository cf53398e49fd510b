use actix::prelude::*;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod api;
mod config;
mod domain;
mod metrics;
mod models;
mod notifications;
mod store;
mod utils;

use actors::MaintenanceScheduleActor;
use config::AppConfig;
use domain::order::OrderLifecycleManager;
use domain::vehicle::{MaintenanceScanner, VehicleLifecycleManager};
use notifications::{NotificationBus, NotificationInbox, PushHub, TopicHub};
use store::{MemoryStore, PgStore, Repositories};
use utils::RetryConfig;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,logistics_dispatch=debug")),
        )
        .init();

    tracing::info!("Starting logistics dispatch service");

    let config = AppConfig::from_env()?;

    // === 1. Storage ===
    let repos = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            let store = PgStore::connect(url, config.db_max_connections).await?;
            store.ensure_schema().await?;
            Repositories::postgres(Arc::new(store))
        }
        None => {
            tracing::warn!("No database configured, using in-memory store");
            Repositories::memory(Arc::new(MemoryStore::new()))
        }
    };

    // === 2. Metrics and notification fan-out ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    let bus = Arc::new(NotificationBus::new(
        repos.notifications.clone(),
        Arc::new(TopicHub::new(config.channel_capacity)),
        Arc::new(PushHub::new(config.channel_capacity)),
        metrics.clone(),
    ));

    // === 3. Lifecycle managers ===
    let orders = Arc::new(OrderLifecycleManager::new(
        repos.clone(),
        bus.clone(),
        metrics.clone(),
        config.order_policy(),
    ));
    let vehicles = Arc::new(VehicleLifecycleManager::new(
        repos.clone(),
        bus.clone(),
        metrics.clone(),
        config.thresholds,
        RetryConfig::default(),
    ));
    let scanner = Arc::new(MaintenanceScanner::new(
        repos.vehicles.clone(),
        bus.clone(),
        metrics.clone(),
        config.thresholds.maintenance_window_days,
    ));

    // === 4. Scheduled maintenance scan ===
    let scheduler = config.maintenance_scan_interval.map(|interval| {
        tracing::info!(?interval, "Starting maintenance schedule");
        MaintenanceScheduleActor::new(scanner.clone(), interval).start()
    });

    let state = api::AppState {
        orders,
        vehicles,
        scanner,
        inbox: Arc::new(NotificationInbox::new(repos.notifications.clone(), bus.clone())),
        bus: bus.clone(),
        metrics,
        scheduler,
    };

    // === 5. HTTP surface ===
    tracing::info!(addr = %config.http_addr, "Listening");
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure)
    })
    .bind(config.http_addr)?
    .run()
    .await?;

    bus.shutdown();
    tracing::info!("Shutdown complete");

    Ok(())
}
