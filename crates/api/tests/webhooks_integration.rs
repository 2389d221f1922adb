//! Integration tests for the payment webhook receiver.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{
    create_intent, create_test_app, parse_response_body, send, unique_user_id, webhook_request,
};
use domain::services::NotificationType;

#[tokio::test]
async fn test_unsigned_webhook_is_rejected() {
    let app = create_test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/payments")
        .header("Content-Type", "application/json")
        .body(Body::from(
            r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"intentId":"pi_x","status":"succeeded"}}"#,
        ))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "webhook_signature_invalid");
}

#[tokio::test]
async fn test_tampered_signature_is_rejected() {
    let app = create_test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/payments")
        .header("Payment-Signature", "t=1700000000,v1=deadbeef")
        .body(Body::from(r#"{"id":"evt_1"}"#))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_succeeded_webhook_creates_registration_once() {
    let app = create_test_app().await;
    let intent = create_intent(&app, &unique_user_id(), app.open_ticket_id).await;
    let intent_id = intent["intentId"].as_str().unwrap();

    let response = send(&app, webhook_request("evt_1", intent_id, "succeeded")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["received"], true);
    assert_eq!(body["applied"], true);

    // Processors redeliver; the replay must be a no-op.
    let response = send(&app, webhook_request("evt_1", intent_id, "succeeded")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["applied"], false);

    assert_eq!(app.store.registration_count().await, 1);
    let usage = app.store.event_seat_usage(app.event_id).await;
    assert_eq!(usage.confirmed, 1);
    assert_eq!(usage.held, 0);
    assert_eq!(
        app.notifier.sent_types().await,
        vec![NotificationType::PaymentConfirmed]
    );
}

#[tokio::test]
async fn test_failed_webhook_releases_seat() {
    let app = create_test_app().await;
    let intent = create_intent(&app, &unique_user_id(), app.open_ticket_id).await;
    let intent_id = intent["intentId"].as_str().unwrap();
    assert_eq!(app.store.event_seat_usage(app.event_id).await.held, 1);

    let response = send(&app, webhook_request("evt_2", intent_id, "failed")).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.store.event_seat_usage(app.event_id).await.held, 0);
    assert_eq!(app.store.registration_count().await, 0);
}

#[tokio::test]
async fn test_unknown_intent_is_acknowledged() {
    let app = create_test_app().await;

    let response = send(&app, webhook_request("evt_3", "pi_unknown", "succeeded")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["received"], true);
    assert_eq!(body["applied"], false);
}

#[tokio::test]
async fn test_buyer_can_retry_after_failed_payment() {
    let app = create_test_app().await;
    let user_id = unique_user_id();
    let first = create_intent(&app, &user_id, app.open_ticket_id).await;
    let first_id = first["intentId"].as_str().unwrap();

    let response = send(&app, webhook_request("evt_fail", first_id, "failed")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let retry = create_intent(&app, &user_id, app.open_ticket_id).await;
    assert_ne!(retry["intentId"], first["intentId"]);
    assert_eq!(retry["reused"], false);
    assert_eq!(app.processor.intents_created(), 2);
    assert_eq!(app.store.event_seat_usage(app.event_id).await.held, 1);
}
