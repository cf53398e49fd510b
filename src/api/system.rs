use actix_web::{web, HttpResponse, Responder};

use super::AppState;
use crate::actors::GetScanStatus;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn health_handler(state: web::Data<AppState>) -> impl Responder {
    let maintenance_scan = match &state.scheduler {
        Some(scheduler) => scheduler.send(GetScanStatus).await.ok(),
        None => None,
    };

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "logistics-dispatch",
        "pushClients": state.bus.push().client_count(),
        "subscriptionTopics": state.bus.topics().topic_count(),
        "maintenanceScan": maintenance_scan,
    }))
}
