mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{harness, Harness};
use gallery_checkout::api::{self, AppState};
use gallery_checkout::domain::aggregates::OrderStatus;
use serde_json::{json, Value};
use tower::ServiceExt;

const TOKEN: &str = "back-office-secret";

fn app(h: &Harness) -> Router {
    api::router(AppState {
        service: h.service.clone(),
        admin_token: TOKEN.into(),
        cancel_page_url: "https://gallery.test/checkout/cancelled".into(),
        stale_order_after: Duration::from_secs(3600),
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri).header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap()
}

fn checkout_body(painting_ids: Value) -> Value {
    json!({
        "customerName": "Ana Horvat",
        "email": "ana@example.com",
        "address": {"line1": "Ilica 1", "city": "Zagreb", "postalCode": "10000", "country": "hr"},
        "paintingIds": painting_ids,
        "termsAccepted": true,
        "shippingOptionId": 1
    })
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;
    let (status, body) = send(app(&h), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_shipping_options_lists_active_only() {
    let h = harness().await;
    let (status, body) = send(app(&h), Request::get("/api/v1/shipping-options").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body.as_array().unwrap().iter().map(|o| o["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Standard", "Pickup"]);
}

#[tokio::test]
async fn test_checkout_then_confirm() {
    let h = harness().await;
    let (status, body) = send(app(&h), post_json("/api/v1/orders/create-session", checkout_body(json!([1, 3])))).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    assert!(body["sessionUrl"].as_str().unwrap().starts_with("https://checkout.test/"));

    h.gateway.pay(&session_id);
    let (status, body) = send(app(&h), post_json("/api/v1/payment/confirm", json!({"sessionId": session_id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["totalAmount"], "2110");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let (status, body) = send(app(&h), post_json("/api/v1/payment/confirm", json!(session_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
}

#[tokio::test]
async fn test_checkout_validation_errors() {
    let h = harness().await;
    let mut body = checkout_body(json!([1]));
    body["termsAccepted"] = json!(false);
    let (status, body) = send(app(&h), post_json("/api/v1/orders/create-session", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = send(app(&h), post_json("/api/v1/orders/create-session", checkout_body(json!([4])))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_gateway_outage_is_bad_gateway() {
    let h = harness().await;
    h.gateway.fail_next_create();
    let (status, body) = send(app(&h), post_json("/api/v1/orders/create-session", checkout_body(json!([1])))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "payment_provider_unavailable");
    assert!(!body["message"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_confirm_failures() {
    let h = harness().await;
    let (status, body) = send(app(&h), post_json("/api/v1/payment/confirm", json!({"sessionId": "cs_missing"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let session = h.service.create_order_and_start_payment(common::checkout_request(vec![1])).await.unwrap();
    h.gateway.expire(&session.session_id);
    let (status, body) = send(app(&h), post_json("/api/v1/payment/confirm", json!({"sessionId": session.session_id}))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_not_completed");
}

#[tokio::test]
async fn test_cancel_redirects_and_cancels() {
    let h = harness().await;
    let session = h.service.create_order_and_start_payment(common::checkout_request(vec![1])).await.unwrap();
    let request = Request::get(format!("/api/v1/payment/cancel?session_id={}", session.session_id)).body(Body::empty()).unwrap();
    let response = app(&h).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "https://gallery.test/checkout/cancelled");
    assert_eq!(h.service.get_order(session.order_id).await.unwrap().status(), OrderStatus::Cancelled);

    let response = app(&h).oneshot(Request::get("/api/v1/payment/cancel").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let h = harness().await;
    let (status, body) = send(app(&h), Request::get("/api/v1/orders").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let wrong = Request::get("/api/v1/orders").header(header::AUTHORIZATION, "Bearer nope").body(Body::empty()).unwrap();
    assert_eq!(send(app(&h), wrong).await.0, StatusCode::UNAUTHORIZED);

    h.service.create_order_and_start_payment(common::checkout_request(vec![1])).await.unwrap();
    let ok = Request::get("/api/v1/orders").header(header::AUTHORIZATION, format!("Bearer {}", TOKEN)).body(Body::empty()).unwrap();
    let (status, body) = send(app(&h), ok).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "pending");
}

#[tokio::test]
async fn test_admin_status_and_tracking_updates() {
    let h = harness().await;
    let session = h.service.create_order_and_start_payment(common::checkout_request(vec![1])).await.unwrap();
    let put = |path: String, body: Value| {
        Request::put(path).header(header::CONTENT_TYPE, "application/json").header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .body(Body::from(body.to_string())).unwrap()
    };
    let status_path = format!("/api/v1/orders/{}/status", session.order_id);

    let (status, body) = send(app(&h), put(status_path.clone(), json!({"status": "shipped"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    let (status, _) = send(app(&h), put(status_path.clone(), json!({"status": "lost"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app(&h), put(status_path, json!({"status": "canceled"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = send(app(&h), put(format!("/api/v1/orders/{}/tracking", session.order_id), json!({"trackingNumber": "RR1HR"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trackingNumber"], "RR1HR");

    let (status, _) = send(app(&h), put(format!("/api/v1/orders/{}/tracking", uuid::Uuid::now_v7()), json!({"trackingNumber": "X"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reconcile_window_bounds() {
    let h = harness().await;
    let reconcile = |body: Value| {
        Request::post("/api/v1/orders/reconcile").header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN)).body(Body::from(body.to_string())).unwrap()
    };

    let (status, body) = send(app(&h), reconcile(json!({"olderThanMinutes": u64::MAX}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = send(app(&h), reconcile(json!({"olderThanMinutes": 1_000_000_000_000u64}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app(&h), reconcile(json!({"olderThanMinutes": 60}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], 0);
}
