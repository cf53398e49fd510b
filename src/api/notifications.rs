use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::AppState;
use crate::domain::LifecycleError;
use crate::models::NotificationDraft;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/notifications")
            .route(web::get().to(list_notifications))
            .route(web::post().to(create_notification)),
    )
    .route("/notifications/read-all", web::post().to(mark_all_read))
    .service(
        web::resource("/notifications/{id}")
            .route(web::get().to(get_notification))
            .route(web::delete().to(delete_notification)),
    )
    .route("/notifications/{id}/read", web::post().to(mark_read));
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    unread_only: bool,
}

async fn list_notifications(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.inbox.list(query.unread_only).await?))
}

async fn create_notification(
    state: web::Data<AppState>,
    body: web::Json<NotificationDraft>,
) -> Result<HttpResponse, LifecycleError> {
    let notification = state.inbox.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(notification))
}

async fn get_notification(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.inbox.get(id.into_inner()).await?))
}

async fn mark_read(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> Result<HttpResponse, LifecycleError> {
    Ok(HttpResponse::Ok().json(state.inbox.mark_read(id.into_inner()).await?))
}

async fn mark_all_read(state: web::Data<AppState>) -> Result<HttpResponse, LifecycleError> {
    let updated = state.inbox.mark_all_read().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

async fn delete_notification(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> Result<HttpResponse, LifecycleError> {
    state.inbox.delete(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state;
    use crate::domain::testkit::Harness;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_manual_notification_round() {
        let h = Harness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/notifications")
            .set_json(json!({
                "type": "warning",
                "title": "Dock closed",
                "message": "Dock 4 is closed until noon",
                "metadata": {"userId": 3}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["type"], "warning");
        assert_eq!(created["read"], false);
        assert_eq!(created["metadata"]["userId"], 3);

        let req = test::TestRequest::get()
            .uri("/api/notifications?unreadOnly=true")
            .to_request();
        let unread: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(unread.len(), 1);

        let req = test::TestRequest::post().uri("/api/notifications/1/read").to_request();
        let read: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(read["read"], true);

        let req = test::TestRequest::post().uri("/api/notifications/read-all").to_request();
        let result: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(result["updated"], 0);

        let req = test::TestRequest::delete().uri("/api/notifications/1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri("/api/notifications/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "not_found");
    }
}
