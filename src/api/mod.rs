// ============================================================================
// HTTP Surface
// ============================================================================
//
// Thin JSON layer over the lifecycle managers:
// - /api/orders, /api/vehicles, /api/notifications - commands and queries
// - /ws                   - push transport (WebSocket)
// - /subscriptions/{topic} - subscription channel (Server-Sent Events)
// - /health, /metrics
//
// Handlers parse, delegate and render. Every rejected command renders as
// `{ "error": <kind>, "message": <text> }`.
//
// ============================================================================

mod live;
mod notifications;
mod orders;
mod system;
mod vehicles;

use actix::Addr;
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use std::sync::Arc;

use crate::actors::MaintenanceScheduleActor;
use crate::domain::order::OrderLifecycleManager;
use crate::domain::vehicle::{MaintenanceScanner, VehicleLifecycleManager};
use crate::domain::LifecycleError;
use crate::metrics::Metrics;
use crate::notifications::{NotificationBus, NotificationInbox};

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderLifecycleManager>,
    pub vehicles: Arc<VehicleLifecycleManager>,
    pub scanner: Arc<MaintenanceScanner>,
    pub inbox: Arc<NotificationInbox>,
    pub bus: Arc<NotificationBus>,
    pub metrics: Arc<Metrics>,
    pub scheduler: Option<Addr<MaintenanceScheduleActor>>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                LifecycleError::InvalidArgument(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                LifecycleError::InvalidArgument(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                LifecycleError::InvalidArgument(err.to_string()).into()
            }))
            .configure(orders::configure)
            .configure(vehicles::configure)
            .configure(notifications::configure),
    )
    .configure(live::configure)
    .configure(system::configure);
}

impl ResponseError for LifecycleError {
    fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
            LifecycleError::InvalidTransition { .. }
            | LifecycleError::VehicleNotAvailable { .. } => StatusCode::CONFLICT,
            LifecycleError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LifecycleError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let LifecycleError::Persistence(e) = self {
            tracing::error!(error = %e, "Request failed on persistence");
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

/// Parse an enum-valued path or query parameter.
fn parse_param<T>(name: &str, raw: &str) -> Result<T, LifecycleError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| LifecycleError::InvalidArgument(format!("{}: {}", name, e)))
}

/// Same as `parse_param` for optional, possibly blank, query values.
fn parse_optional<T>(name: &str, raw: Option<&str>) -> Result<Option<T>, LifecycleError>
where
    T: std::str::FromStr<Err = String>,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_param(name, value).map(Some),
        None => Ok(None),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_error_kinds_map_to_distinct_statuses() {
        assert_eq!(
            LifecycleError::order_not_found(1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LifecycleError::VehicleNotAvailable {
                vehicle_id: 1,
                status: "maintenance".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            LifecycleError::InvalidArgument("x".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            LifecycleError::Persistence(StoreError::Unavailable("down".to_string())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_optional_params_ignore_blank_values() {
        let parsed: Option<crate::domain::order::OrderStatus> =
            parse_optional("status", Some(" ")).unwrap();
        assert!(parsed.is_none());

        let err = parse_optional::<crate::domain::order::OrderStatus>("status", Some("lost"))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
