//! Repository tests against a real PostgreSQL database.
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -p persistence -- --ignored`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use domain::models::{
    ApprovalDecision, ApprovalStatus, Event, EventStatus, HoldConfirmation, PaymentIntent,
    PaymentIntentStatus, Registration, RegistrationInsert, ReserveOutcome, Ticket,
};
use domain::store::{CapacityStore, IntentInsert, PaymentIntentStore, RegistrationStore};
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use persistence::repositories::{
    CapacityRepository, CatalogRepository, PaymentIntentRepository, RegistrationRepository,
};
use persistence::{create_pool, run_migrations, DatabaseConfig};
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = create_pool(&DatabaseConfig {
        url,
        max_connections: 20,
        min_connections: 1,
        connect_timeout_secs: 10,
        idle_timeout_secs: 60,
    })
    .await
    .expect("database connection");
    run_migrations(&pool).await.expect("migrations");
    pool
}

async fn seed(pool: &PgPool, capacity: i32, requires_document: bool) -> (Uuid, Uuid) {
    let catalog = CatalogRepository::new(pool.clone());
    let event = Event {
        id: Uuid::new_v4(),
        name: "Ridge Run".to_string(),
        capacity,
        status: EventStatus::OnSale,
        starts_at: None,
        created_at: Utc::now(),
    };
    catalog.create_event(&event).await.unwrap();
    let ticket = Ticket {
        id: Uuid::new_v4(),
        event_id: event.id,
        name: "Open".to_string(),
        base_price_cents: 4_500,
        currency: "eur".to_string(),
        max_participants: 0,
        requires_document,
        document_types: vec![domain::models::DocumentType::MedicalCertificate],
    };
    catalog.create_ticket(&ticket).await.unwrap();
    (event.id, ticket.id)
}

fn registration(event_id: Uuid, ticket_id: Uuid, requires_document: bool) -> Registration {
    let now = Utc::now();
    Registration {
        id: Uuid::new_v4(),
        event_id,
        ticket_id,
        user_id: "user-1".to_string(),
        email: SafeEmail().fake(),
        payment_intent_id: format!("pi_{}", Uuid::new_v4().simple()),
        upsells: vec![],
        amount_cents: 4_500,
        currency: "eur".to_string(),
        document_required: requires_document,
        approval_status: if requires_document {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        },
        checked_in: false,
        checked_in_at: None,
        qr_code_token: shared::crypto::generate_token(),
        document_type: None,
        document_url: None,
        created_at: now,
        approved_at: (!requires_document).then_some(now),
        rejection_reason: None,
    }
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_concurrent_reserves_respect_capacity() {
    let pool = pool().await;
    let (event_id, ticket_id) = seed(&pool, 5, false).await;
    let repo = Arc::new(CapacityRepository::new(pool.clone()));

    let mut handles = Vec::new();
    for _ in 0..25 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let now = Utc::now();
            repo.try_reserve(event_id, ticket_id, now, now + Duration::minutes(10))
                .await
                .unwrap()
        }));
    }

    let mut granted = Vec::new();
    for handle in handles {
        if let ReserveOutcome::Granted(hold) = handle.await.unwrap() {
            granted.push(hold);
        }
    }
    assert_eq!(granted.len(), 5);

    assert_eq!(
        repo.confirm_hold(granted[0].id).await.unwrap(),
        HoldConfirmation::Confirmed
    );
    assert_eq!(
        repo.confirm_hold(granted[0].id).await.unwrap(),
        HoldConfirmation::AlreadyConfirmed
    );
    assert!(repo.release_hold(granted[1].id).await.unwrap());
    assert_eq!(
        repo.confirm_hold(granted[1].id).await.unwrap(),
        HoldConfirmation::Lapsed
    );
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_expired_holds_free_seats() {
    let pool = pool().await;
    let (event_id, ticket_id) = seed(&pool, 1, false).await;
    let repo = CapacityRepository::new(pool.clone());

    let now = Utc::now();
    let outcome = repo
        .try_reserve(event_id, ticket_id, now, now - Duration::seconds(1))
        .await
        .unwrap();
    assert!(matches!(outcome, ReserveOutcome::Granted(_)));

    // The next reserve expires the stale hold before counting.
    let outcome = repo
        .try_reserve(event_id, ticket_id, Utc::now(), now + Duration::minutes(10))
        .await
        .unwrap();
    assert!(matches!(outcome, ReserveOutcome::Granted(_)));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_open_intent_key_is_unique() {
    let pool = pool().await;
    let (event_id, ticket_id) = seed(&pool, 10, false).await;
    let capacity = CapacityRepository::new(pool.clone());
    let intents = PaymentIntentRepository::new(pool.clone());

    let now = Utc::now();
    let mut holds = Vec::new();
    for _ in 0..2 {
        match capacity
            .try_reserve(event_id, ticket_id, now, now + Duration::minutes(10))
            .await
            .unwrap()
        {
            ReserveOutcome::Granted(hold) => holds.push(hold.id),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    let key = shared::crypto::sha256_hex(&Uuid::new_v4().to_string());
    let intent = |id: &str, hold_id: Uuid| PaymentIntent {
        id: id.to_string(),
        idempotency_key: key.clone(),
        user_id: "user-1".to_string(),
        email: "runner@example.com".to_string(),
        event_id,
        ticket_id,
        hold_id,
        upsells: vec![],
        amount_cents: 4_500,
        currency: "eur".to_string(),
        client_secret: format!("{id}_secret"),
        status: PaymentIntentStatus::RequiresPayment,
        document: None,
        price_tier_id: None,
        created_at: now,
        updated_at: now,
    };

    let first_id = format!("pi_{}", Uuid::new_v4().simple());
    let second_id = format!("pi_{}", Uuid::new_v4().simple());
    assert!(matches!(
        intents.insert_intent(intent(&first_id, holds[0])).await.unwrap(),
        IntentInsert::Inserted(_)
    ));
    match intents.insert_intent(intent(&second_id, holds[1])).await.unwrap() {
        IntentInsert::Existing(existing) => assert_eq!(existing.id, first_id),
        IntentInsert::Inserted(_) => panic!("second open intent for the same key"),
    }

    let moved = intents
        .transition_intent(&first_id, PaymentIntentStatus::Succeeded, Utc::now())
        .await
        .unwrap();
    assert!(moved.is_some());
    let replay = intents
        .transition_intent(&first_id, PaymentIntentStatus::Failed, Utc::now())
        .await
        .unwrap();
    assert!(replay.is_none());
    assert_eq!(intents.count_closed_by_key(&key).await.unwrap(), 1);

    let orphans = intents.list_unregistered_succeeded().await.unwrap();
    assert!(orphans.iter().any(|i| i.id == first_id));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_registration_insert_and_check_in() {
    let pool = pool().await;
    let (event_id, ticket_id) = seed(&pool, 10, true).await;
    let repo = RegistrationRepository::new(pool.clone());

    let row = registration(event_id, ticket_id, true);
    let created = repo.insert_registration(row.clone()).await.unwrap();
    assert!(matches!(created, RegistrationInsert::Created(_)));

    let mut duplicate = registration(event_id, ticket_id, true);
    duplicate.payment_intent_id = row.payment_intent_id.clone();
    match repo.insert_registration(duplicate).await.unwrap() {
        RegistrationInsert::Existing(existing) => assert_eq!(existing.id, row.id),
        RegistrationInsert::Created(_) => panic!("duplicate registration created"),
    }

    // Pending rows cannot check in.
    assert!(repo
        .check_in(&row.qr_code_token, Utc::now())
        .await
        .unwrap()
        .is_none());

    let approved = repo
        .set_approval(row.id, &ApprovalDecision::Approve, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.approval_status, ApprovalStatus::Approved);
    assert!(repo
        .set_approval(
            row.id,
            &ApprovalDecision::Reject {
                reason: "late".to_string()
            },
            Utc::now()
        )
        .await
        .unwrap()
        .is_none());

    let first = repo.check_in(&row.qr_code_token, Utc::now()).await.unwrap();
    let second = repo.check_in(&row.qr_code_token, Utc::now()).await.unwrap();
    assert!(first.is_some());
    assert!(second.is_none());

    let counter = repo.find_checkin_counter(event_id).await.unwrap().unwrap();
    assert_eq!(counter.checked_in, 1);

    let stats = repo.checkin_stats(event_id).await.unwrap();
    assert_eq!((stats.total, stats.checked_in, stats.pending), (1, 1, 0));

    sqlx::query("UPDATE event_checkin_counters SET checked_in = 9 WHERE event_id = $1")
        .bind(event_id)
        .execute(&pool)
        .await
        .unwrap();
    let drifts = repo.reconcile_checkin_counters(Utc::now()).await.unwrap();
    let drift = drifts.iter().find(|d| d.event_id == event_id).unwrap();
    assert_eq!((drift.cached, drift.actual), (9, 1));
}
