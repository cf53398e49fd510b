use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use super::AppState;
use crate::actors::PushSession;
use crate::notifications::topic;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(push_socket))
        .route("/subscriptions/{topic}", web::get().to(subscribe));
}

// ============================================================================
// GET /ws - push transport
// ============================================================================

async fn push_socket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let hub = state.bus.push().clone();
    let (client_id, frames) = hub.register();

    let session = PushSession::new(client_id, frames, hub.clone(), state.metrics.clone());
    ws::start(session, &req, stream).map_err(|e| {
        hub.unregister(client_id);
        e
    })
}

// ============================================================================
// GET /subscriptions/{topic} - subscription channel (SSE)
// ============================================================================

async fn subscribe(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let topic = path.into_inner();
    if !topic::is_known(&topic) {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "not_found",
            "message": format!("Unknown topic: {}", topic),
        }));
    }

    let rx = state.bus.topics().subscribe(&topic);
    tracing::debug!(%topic, "Subscription opened");

    let event_name = Arc::new(topic);
    let events = BroadcastStream::new(rx).filter_map(move |item| {
        let event_name = event_name.clone();
        async move {
            match item {
                Ok(payload) => {
                    let data = serde_json::to_string(payload.as_ref()).ok()?;
                    let frame = format!("event: {}\ndata: {}\n\n", event_name, data);
                    Some(Ok::<_, Infallible>(web::Bytes::from(frame)))
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %event_name, skipped, "Subscriber lagged, skipping events");
                    None
                }
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state;
    use crate::domain::testkit::Harness;
    use crate::models::OrderDraft;
    use actix_web::{body::MessageBody, http::StatusCode, test, App};
    use chrono::NaiveDate;

    #[actix_web::test]
    async fn test_subscription_streams_topic_events() {
        let h = Harness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/subscriptions/NOTIFICATION_CREATED")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.bus.topics().subscriber_count(topic::NOTIFICATION_CREATED), 1);

        h.orders
            .create_order(OrderDraft::new("Acme", NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()))
            .await
            .unwrap();

        let mut body = Box::pin(resp.into_body());
        let chunk = futures_util::future::poll_fn(|cx| body.as_mut().poll_next(cx))
            .await
            .unwrap()
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.starts_with("event: NOTIFICATION_CREATED\ndata: "));
        assert!(text.contains("\"title\":\"New order\""));
        assert!(text.ends_with("\n\n"));
    }

    #[actix_web::test]
    async fn test_unknown_topic_is_rejected_without_a_channel() {
        let h = Harness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&h)))
                .configure(crate::api::configure),
        )
        .await;

        for i in 0..50 {
            let req = test::TestRequest::get()
                .uri(&format!("/subscriptions/bogus-{}", i))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(h.bus.topics().topic_count(), 0);

        let req = test::TestRequest::get()
            .uri("/subscriptions/order_updated")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "not_found");
        assert_eq!(h.bus.topics().topic_count(), 0);
    }
}
