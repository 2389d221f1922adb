//! Shared fixtures for domain integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use domain::models::{
    DocumentType, Event, EventStatus, HoldStatus, PaymentIntentStatus, PriceTier, Ticket,
};
use domain::services::{
    CapacityAllocator, CheckInService, CreateIntentCommand, DocumentApprovalGate,
    MockPaymentProcessor, PaymentIntentCoordinator, PaymentSettings, RecordingNotifier,
    RegistrationLedger,
};
use domain::store::{CapacityStore, InMemoryStore};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub struct HarnessOptions {
    pub capacity: i32,
    pub max_participants: i32,
    pub requires_document: bool,
    pub base_price_cents: i64,
    pub hold_ttl_secs: i64,
    pub intent_timeout_secs: i64,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            capacity: 100,
            max_participants: 0,
            requires_document: false,
            base_price_cents: 10_000,
            hold_ttl_secs: 600,
            intent_timeout_secs: 1_800,
        }
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub processor: Arc<MockPaymentProcessor>,
    pub notifier: Arc<RecordingNotifier>,
    pub capacity: CapacityAllocator,
    pub ledger: RegistrationLedger,
    pub payments: PaymentIntentCoordinator,
    pub documents: DocumentApprovalGate,
    pub checkin: CheckInService,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
}

pub async fn harness(options: HarnessOptions) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(MockPaymentProcessor::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let event_id = Uuid::new_v4();
    let ticket_id = Uuid::new_v4();
    store
        .insert_event(Event {
            id: event_id,
            name: "Spartan Sprint".to_string(),
            capacity: options.capacity,
            status: EventStatus::OnSale,
            starts_at: None,
            created_at: Utc::now(),
        })
        .await;
    store
        .insert_ticket(Ticket {
            id: ticket_id,
            event_id,
            name: "Age group".to_string(),
            base_price_cents: options.base_price_cents,
            currency: "eur".to_string(),
            max_participants: options.max_participants,
            requires_document: options.requires_document,
            document_types: if options.requires_document {
                vec![DocumentType::MedicalCertificate]
            } else {
                vec![]
            },
        })
        .await;

    let capacity = CapacityAllocator::new(store.clone(), options.hold_ttl_secs);
    let ledger = RegistrationLedger::new(store.clone(), store.clone(), notifier.clone());
    let payments = PaymentIntentCoordinator::new(
        store.clone(),
        store.clone(),
        capacity.clone(),
        ledger.clone(),
        processor.clone(),
        PaymentSettings {
            webhook_secret: WEBHOOK_SECRET.to_string(),
            intent_timeout_secs: options.intent_timeout_secs,
            ..PaymentSettings::default()
        },
    );
    let documents = DocumentApprovalGate::new(ledger.clone(), store.clone());
    let checkin = CheckInService::new(ledger.clone(), store.clone());

    Harness {
        store,
        processor,
        notifier,
        capacity,
        ledger,
        payments,
        documents,
        checkin,
        event_id,
        ticket_id,
    }
}

impl Harness {
    pub fn command(&self, user_id: &str) -> CreateIntentCommand {
        CreateIntentCommand {
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            event_id: self.event_id,
            ticket_id: self.ticket_id,
            upsells: vec![],
            document: None,
        }
    }

    pub async fn add_tier(&self, discount_percentage: i32) -> PriceTier {
        let tier = PriceTier {
            id: Uuid::new_v4(),
            event_id: self.event_id,
            name: format!("{}% off", discount_percentage),
            discount_percentage,
            available_from: None,
            available_until: None,
            display_order: 0,
        };
        self.store.insert_price_tier(tier.clone()).await;
        tier
    }

    pub async fn capacity_hold(&self, hold_id: Uuid) -> HoldStatus {
        self.store.find_hold(hold_id).await.unwrap().unwrap().status
    }

    /// Builds a signed webhook delivery for an intent status.
    pub fn webhook(&self, intent_id: &str, status: PaymentIntentStatus) -> (Vec<u8>, String) {
        let body = serde_json::json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": format!("payment_intent.{}", status),
            "data": { "intentId": intent_id, "status": status.as_str() }
        })
        .to_string()
        .into_bytes();
        let header =
            shared::crypto::sign_webhook(WEBHOOK_SECRET, Utc::now().timestamp(), &body).unwrap();
        (body, header)
    }

    /// Marks the intent paid at the processor and delivers the webhook.
    pub async fn pay(&self, intent_id: &str) {
        self.processor
            .set_status(intent_id, PaymentIntentStatus::Succeeded)
            .await;
        let (body, header) = self.webhook(intent_id, PaymentIntentStatus::Succeeded);
        self.payments
            .handle_webhook(&body, Some(&header))
            .await
            .unwrap();
    }
}
