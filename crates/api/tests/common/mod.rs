//! Common test utilities for integration tests.
//!
//! The app is built over the in-memory store, so these tests need no database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use domain::models::{DocumentType, Event, EventStatus, PaymentIntentStatus, Ticket};
use domain::services::{MockPaymentProcessor, RecordingNotifier};
use domain::store::InMemoryStore;
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use race_registration_api::{
    app::{create_app, AppServices},
    config::{
        Config, DatabaseConfig, HoldsConfig, JobsConfig, LoggingConfig, PaymentProvider,
        PaymentsConfig, SecurityConfig, ServerConfig, StorageBackend, StorageConfig,
    },
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Test configuration for the in-memory backend.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 60,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            cors_origins: vec![],
            checkin_rate_limit_per_minute: 0,
            hsts_enabled: false,
        },
        holds: HoldsConfig {
            ttl_secs: 600,
            sweep_interval_secs: 30,
        },
        payments: PaymentsConfig {
            provider: PaymentProvider::Mock,
            api_base_url: String::new(),
            secret_key: String::new(),
            request_timeout_secs: 5,
            webhook_secret: WEBHOOK_SECRET.to_string(),
            webhook_tolerance_secs: 300,
            idempotency_window_secs: 86_400,
            intent_timeout_secs: 1_800,
        },
        jobs: JobsConfig {
            payment_reconciliation_interval_secs: 60,
            counter_reconciliation_interval_secs: 300,
        },
    }
}

/// Seeded event with two tickets: an open one and a document-gated one.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub processor: Arc<MockPaymentProcessor>,
    pub notifier: Arc<RecordingNotifier>,
    pub event_id: Uuid,
    pub open_ticket_id: Uuid,
    pub document_ticket_id: Uuid,
}

pub struct TestAppOptions {
    pub capacity: i32,
    pub checkin_rate_limit_per_minute: u32,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            capacity: 50,
            checkin_rate_limit_per_minute: 0,
        }
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(TestAppOptions::default()).await
}

pub async fn create_test_app_with(options: TestAppOptions) -> TestApp {
    let mut config = test_config();
    config.security.checkin_rate_limit_per_minute = options.checkin_rate_limit_per_minute;

    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(MockPaymentProcessor::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let event_id = Uuid::new_v4();
    let open_ticket_id = Uuid::new_v4();
    let document_ticket_id = Uuid::new_v4();
    store
        .insert_event(Event {
            id: event_id,
            name: "Lakeside Half Marathon".to_string(),
            capacity: options.capacity,
            status: EventStatus::OnSale,
            starts_at: None,
            created_at: Utc::now(),
        })
        .await;
    store
        .insert_ticket(Ticket {
            id: open_ticket_id,
            event_id,
            name: "Open".to_string(),
            base_price_cents: 4_500,
            currency: "eur".to_string(),
            max_participants: 0,
            requires_document: false,
            document_types: vec![],
        })
        .await;
    store
        .insert_ticket(Ticket {
            id: document_ticket_id,
            event_id,
            name: "Competitive".to_string(),
            base_price_cents: 6_000,
            currency: "eur".to_string(),
            max_participants: 0,
            requires_document: true,
            document_types: vec![DocumentType::MedicalCertificate],
        })
        .await;

    let services = AppServices::in_memory(
        store.clone(),
        processor.clone(),
        notifier.clone(),
        &config,
    );
    let router = create_app(config, None, services);

    TestApp {
        router,
        store,
        processor,
        notifier,
        event_id,
        open_ticket_id,
        document_ticket_id,
    }
}

pub fn unique_email() -> String {
    SafeEmail().fake()
}

pub fn unique_user_id() -> String {
    format!("user-{}", Uuid::new_v4().simple())
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Signed webhook request carrying `status` for `intent_id`.
pub fn webhook_request(event_id: &str, intent_id: &str, status: &str) -> Request<Body> {
    let body = json!({
        "id": event_id,
        "type": format!("payment_intent.{}", status),
        "data": { "intentId": intent_id, "status": status }
    })
    .to_string();
    let signature =
        shared::crypto::sign_webhook(WEBHOOK_SECRET, Utc::now().timestamp(), body.as_bytes())
            .unwrap();

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/payments")
        .header("Content-Type", "application/json")
        .header("Payment-Signature", signature)
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn parse_response_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Opens an intent and returns the response body.
pub async fn create_intent(app: &TestApp, user_id: &str, ticket_id: Uuid) -> Value {
    let request = json_request(
        Method::POST,
        "/api/v1/payment-intents",
        json!({
            "userId": user_id,
            "email": unique_email(),
            "eventId": app.event_id,
            "ticketId": ticket_id,
        }),
    );
    let response = send(app, request).await;
    assert_eq!(response.status(), 200);
    parse_response_body(response).await
}

/// Runs the whole purchase for `ticket_id` and returns the registration body.
pub async fn register_participant(app: &TestApp, ticket_id: Uuid) -> Value {
    let user_id = unique_user_id();
    let intent = create_intent(app, &user_id, ticket_id).await;
    let intent_id = intent["intentId"].as_str().unwrap().to_string();

    assert!(
        app.processor
            .set_status(&intent_id, PaymentIntentStatus::Succeeded)
            .await
    );

    let request = json_request(
        Method::POST,
        "/api/v1/registrations",
        json!({
            "paymentIntentId": intent_id,
            "ticketId": ticket_id,
            "eventId": app.event_id,
            "userId": user_id,
        }),
    );
    let response = send(app, request).await;
    assert_eq!(response.status(), 201);
    parse_response_body(response).await
}
