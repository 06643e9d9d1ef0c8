//! Integration tests for the REST intake, driving the router directly.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bus::{EventPublisher, InMemoryBus, RetryPolicy};
use events::topics;
use saga::{InMemoryOrderStore, OrderService};
use tower::ServiceExt;

use api::routes::orders::AppState;

fn setup() -> (axum::Router, InMemoryBus) {
    let bus = InMemoryBus::new();
    let order_service = Arc::new(OrderService::new(
        InMemoryOrderStore::new(),
        EventPublisher::with_policy(bus.clone(), RetryPolicy::immediate(1)),
    ));
    let state = Arc::new(AppState { order_service });
    (api::create_app(state), bus)
}

fn payment_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/orders/payment")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn valid_body() -> serde_json::Value {
    serde_json::json!({
        "userId": "user-123",
        "amount": 99.99,
        "currency": "USD",
        "paymentMethod": "CREDIT_CARD",
        "items": [{"productId": "p1", "quantity": 2, "price": 49.99}]
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn initiate_returns_created_snapshot() {
    let (app, bus) = setup();

    let response = app.oneshot(payment_request(valid_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["userId"], "user-123");
    assert_eq!(json["currency"], "USD");
    assert_eq!(json["paymentMethod"], "CREDIT_CARD");
    assert!(json["orderId"].is_string());
    assert!(json["sagaId"].is_string());
    assert!(json.get("transactionId").is_none());

    // The saga was actually kicked off.
    assert_eq!(bus.topic_len(topics::PAYMENT_SAGA).await, 1);
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let cases = [
        {
            let mut body = valid_body();
            body["userId"] = serde_json::json!("");
            body
        },
        {
            let mut body = valid_body();
            body["amount"] = serde_json::json!(0);
            body
        },
        {
            let mut body = valid_body();
            body["currency"] = serde_json::json!("US");
            body
        },
        {
            let mut body = valid_body();
            body["paymentMethod"] = serde_json::json!("IOU");
            body
        },
        {
            let mut body = valid_body();
            body["items"] = serde_json::json!([]);
            body
        },
        {
            let mut body = valid_body();
            body["items"][0]["quantity"] = serde_json::json!(0);
            body
        },
        {
            let mut body = valid_body();
            body["items"][0]["price"] = serde_json::json!(-1.0);
            body
        },
    ];

    for body in cases {
        let (app, bus) = setup();
        let description = body.to_string();
        let response = app.oneshot(payment_request(body)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {description}"
        );
        let json = body_json(response).await;
        assert!(json["error"].is_string());
        // Nothing reached the bus.
        assert_eq!(bus.topic_len(topics::PAYMENT_SAGA).await, 0);
    }
}

#[tokio::test]
async fn get_order_requires_matching_owner() {
    let (app, _bus) = setup();

    let created = app
        .clone()
        .oneshot(payment_request(valid_body()))
        .await
        .unwrap();
    let created = body_json(created).await;
    let order_id = created["orderId"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{order_id}"))
                .header("X-User-Id", "user-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["orderId"], *order_id);
    assert_eq!(json["status"], "PENDING");

    // A different user sees nothing.
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{order_id}"))
                .header("X-User-Id", "someone-else")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_unknown_order_is_not_found() {
    let (app, _bus) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}", uuid::Uuid::new_v4()))
                .header("X-User-Id", "user-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_with_malformed_id_is_bad_request() {
    let (app, _bus) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/orders/not-a-uuid")
                .header("X-User-Id", "user-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_without_user_header_is_bad_request() {
    let (app, _bus) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
