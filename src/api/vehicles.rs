use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::{parse_optional, parse_param, AppState};
use crate::domain::vehicle::VehicleStatus;
use crate::domain::LifecycleError;
use crate::models::VehicleDraft;
use crate::store::VehicleFilter;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/vehicles")
            .route(web::get().to(list_vehicles))
            .route(web::post().to(create_vehicle)),
    )
    .route("/vehicles/available", web::get().to(available_vehicles))
    .route("/vehicles/statistics", web::get().to(vehicle_statistics))
    .route("/vehicles/utilization", web::get().to(vehicle_utilization))
    .route("/vehicles/maintenance-check", web::post().to(maintenance_check))
    .route("/vehicles/{id}", web::get().to(get_vehicle))
    .route("/vehicles/{id}/status", web::put().to(update_status))
    .route("/vehicles/{id}/fuel", web::put().to(update_fuel))
    .route("/vehicles/{id}/mileage", web::put().to(update_mileage));
}

#[derive(Debug, Deserialize)]
pub struct VehicleQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelBody {
    fuel_level: i32,
}

#[derive(Debug, Deserialize)]
pub struct MileageBody {
    mileage: i64,
}

async fn create_vehicle(
    state: web::Data<AppState>,
    body: web::Json<VehicleDraft>,
) -> Result<HttpResponse, LifecycleError> {
    let vehicle = state.vehicles.create_vehicle(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(vehicle))
}

async fn list_vehicles(
    state: web::Data<AppState>,
    query: web::Query<VehicleQuery>,
) -> Result<HttpResponse, LifecycleError> {
    let filter = VehicleFilter {
        status: parse_optional::<VehicleStatus>("status", query.status.as_deref())?,
    };
    Ok(HttpResponse::Ok().json(state.vehicles.list_vehicles(&filter).await?))
}

async fn available_vehicles(state: web::Data<AppState>) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.vehicles.available_vehicles().await?))
}

async fn vehicle_statistics(state: web::Data<AppState>) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.vehicles.statistics().await?))
}

async fn vehicle_utilization(state: web::Data<AppState>) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.vehicles.utilization().await?))
}

async fn maintenance_check(state: web::Data<AppState>) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.scanner.scan().await?))
}

async fn get_vehicle(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.vehicles.get_vehicle(id.into_inner()).await?))
}

async fn update_status(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    body: web::Json<StatusBody>,
) -> Result<HttpResponse, LifecycleError> {
    let status: VehicleStatus = parse_param("status", &body.status)?;
    let vehicle = state
        .vehicles
        .update_vehicle_status(id.into_inner(), status)
        .await?;
    Ok(HttpResponse::Ok().json(vehicle))
}

async fn update_fuel(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    body: web::Json<FuelBody>,
) -> Result<HttpResponse, LifecycleError> {
    let vehicle = state
        .vehicles
        .update_fuel_level(id.into_inner(), body.fuel_level)
        .await?;
    Ok(HttpResponse::Ok().json(vehicle))
}

async fn update_mileage(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    body: web::Json<MileageBody>,
) -> Result<HttpResponse, LifecycleError> {
    let vehicle = state
        .vehicles
        .update_mileage(id.into_inner(), body.mileage)
        .await?;
    Ok(HttpResponse::Ok().json(vehicle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state;
    use crate::domain::testkit::Harness;
    use actix_web::{http::StatusCode, test, App};
    use chrono::Utc;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_create_and_fuel_update() {
        let h = Harness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/vehicles")
            .set_json(json!({"plateNumber": "AB-123", "model": "Actros", "nextMaintenance": "2099-01-01"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let vehicle: Value = test::read_body_json(resp).await;
        assert_eq!(vehicle["vehicleId"], "VEH-001");
        assert_eq!(vehicle["fuelLevel"], 100);

        let req = test::TestRequest::put()
            .uri("/api/vehicles/1/fuel")
            .set_json(json!({"fuelLevel": 15}))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated["fuelLevel"], 15);

        let req = test::TestRequest::put()
            .uri("/api/vehicles/1/fuel")
            .set_json(json!({"fuelLevel": 101}))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[actix_web::test]
    async fn test_fleet_queries() {
        let h = Harness::new();
        h.seed_vehicles(2).await;
        h.vehicles
            .update_vehicle_status(2, VehicleStatus::Maintenance)
            .await
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/vehicles/available").to_request();
        let available: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(available.len(), 1);

        let req = test::TestRequest::get().uri("/api/vehicles?status=maintenance").to_request();
        let in_shop: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(in_shop[0]["id"], 2);

        let req = test::TestRequest::get().uri("/api/vehicles/utilization").to_request();
        let utilization: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(utilization["utilizationRate"], 50.0);

        let req = test::TestRequest::get().uri("/api/vehicles/statistics").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["outOfService"], 0);
    }

    #[actix_web::test]
    async fn test_maintenance_check_returns_due_vehicles() {
        let h = Harness::new();
        h.seed_vehicles(1).await;
        h.vehicles
            .create_vehicle(VehicleDraft::new("DUE-1", Utc::now().date_naive()))
            .await
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/vehicles/maintenance-check")
            .to_request();
        let due: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0]["plateNumber"], "DUE-1");
        assert_eq!(due[0]["daysRemaining"], 0);
    }

    #[actix_web::test]
    async fn test_mileage_regression_is_rejected() {
        let h = Harness::new();
        h.seed_vehicles(1).await;
        h.vehicles.update_mileage(1, 1_000).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/vehicles/1/mileage")
            .set_json(json!({"mileage": 10}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_argument");
    }
}
