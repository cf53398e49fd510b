use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::{parse_optional, parse_param, AppState};
use crate::domain::order::{OrderPriority, OrderStatus};
use crate::domain::LifecycleError;
use crate::models::OrderDraft;
use crate::store::OrderFilter;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/orders")
            .route(web::get().to(list_orders))
            .route(web::post().to(create_order)),
    )
    .route("/orders/statistics", web::get().to(order_statistics))
    .route("/orders/{id}", web::get().to(get_order))
    .route("/orders/{id}/status", web::put().to(update_order_status))
    .route("/orders/{id}/assign", web::post().to(assign_vehicle));
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    status: Option<String>,
    priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    vehicle_id: i64,
}

async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<OrderDraft>,
) -> Result<HttpResponse, LifecycleError> {
    let order = state.orders.create_order(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse, LifecycleError> {
    let filter = OrderFilter {
        status: parse_optional::<OrderStatus>("status", query.status.as_deref())?,
        priority: parse_optional::<OrderPriority>("priority", query.priority.as_deref())?,
    };
    Ok(HttpResponse::Ok().json(state.orders.list_orders(&filter).await?))
}

async fn order_statistics(state: web::Data<AppState>) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.orders.statistics().await?))
}

async fn get_order(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.orders.get_order(id.into_inner()).await?))
}

async fn update_order_status(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    body: web::Json<StatusBody>,
) -> Result<HttpResponse, LifecycleError> {
    let status: OrderStatus = parse_param("status", &body.status)?;
    let view = state.orders.update_order_status(id.into_inner(), status).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn assign_vehicle(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    body: web::Json<AssignBody>,
) -> Result<HttpResponse, LifecycleError> {
    let view = state
        .orders
        .assign_vehicle_to_order(id.into_inner(), body.vehicle_id)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state;
    use crate::domain::testkit::Harness;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_create_then_fetch_order() {
        let h = Harness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(json!({"customerName": "Acme", "estimatedDelivery": "2024-02-01"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["orderId"], "ORD-001");
        assert_eq!(created["status"], "pending");

        let req = test::TestRequest::get().uri("/api/orders/1").to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched["customerName"], "Acme");
        assert!(fetched["vehicle"].is_null());
    }

    #[actix_web::test]
    async fn test_assignment_conflict_renders_error_kind() {
        let h = Harness::new();
        h.seed_orders(2).await;
        h.seed_vehicles(1).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders/1/assign")
            .set_json(json!({"vehicleId": 1}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let view: Value = test::read_body_json(resp).await;
        assert_eq!(view["status"], "in_transit");
        assert_eq!(view["vehicle"]["status"], "in_use");

        let req = test::TestRequest::post()
            .uri("/api/orders/2/assign")
            .set_json(json!({"vehicleId": 1}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "vehicle_not_available");
    }

    #[actix_web::test]
    async fn test_status_update_validation() {
        let h = Harness::new();
        h.seed_orders(1).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/orders/1/status")
            .set_json(json!({"status": "teleported"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let req = test::TestRequest::put()
            .uri("/api/orders/1/status")
            .set_json(json!({"status": "delivered"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::put()
            .uri("/api/orders/1/status")
            .set_json(json!({"status": "pending"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_transition");

        let req = test::TestRequest::get().uri("/api/orders/99").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_malformed_requests_render_error_envelope() {
        let h = Harness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        // Missing customerName
        let req = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(json!({"estimatedDelivery": "2024-02-01"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_argument");
        assert!(body["message"].as_str().unwrap().contains("customerName"));

        let req = test::TestRequest::get().uri("/api/orders/abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_argument");

        let req = test::TestRequest::post()
            .uri("/api/orders/1/assign")
            .set_json(json!({"vehicleId": "first"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert!(h.notifications().await.is_empty());
    }

    #[actix_web::test]
    async fn test_list_filters_and_statistics() {
        let h = Harness::new();
        h.seed_orders(3).await;
        h.orders.update_order_status(2, OrderStatus::Cancelled).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/orders?status=pending").to_request();
        let pending: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0]["orderId"], "ORD-003");

        let req = test::TestRequest::get().uri("/api/orders/statistics").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["cancelled"], 1);
        assert_eq!(stats["inTransit"], 0);
    }
}
