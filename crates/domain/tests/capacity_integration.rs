//! Capacity allocation under concurrency.

mod common;

use common::{harness, HarnessOptions};
use domain::models::SeatUsage;
use domain::RegistrationError;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_reserves_never_oversell() {
    let h = harness(HarnessOptions {
        capacity: 10,
        ..HarnessOptions::default()
    })
    .await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let allocator = h.capacity.clone();
        let (event_id, ticket_id) = (h.event_id, h.ticket_id);
        handles.push(tokio::spawn(async move {
            allocator.reserve(event_id, ticket_id).await
        }));
    }

    let mut granted = 0;
    let mut exceeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(RegistrationError::CapacityExceeded { .. }) => exceeded += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(granted, 10);
    assert_eq!(exceeded, 40);
    assert_eq!(h.store.event_seat_usage(h.event_id).await.held, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ticket_limit_applies_below_event_capacity() {
    let h = harness(HarnessOptions {
        capacity: 100,
        max_participants: 3,
        ..HarnessOptions::default()
    })
    .await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let allocator = h.capacity.clone();
        let (event_id, ticket_id) = (h.event_id, h.ticket_id);
        handles.push(tokio::spawn(async move {
            allocator.reserve(event_id, ticket_id).await.is_ok()
        }));
    }
    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_seat_race_then_confirm() {
    let h = harness(HarnessOptions {
        capacity: 1,
        ..HarnessOptions::default()
    })
    .await;

    let (a, b) = tokio::join!(
        h.capacity.reserve(h.event_id, h.ticket_id),
        h.capacity.reserve(h.event_id, h.ticket_id)
    );
    let (winner, loser) = match (a, b) {
        (Ok(hold), Err(e)) | (Err(e), Ok(hold)) => (hold, e),
        other => panic!("expected exactly one hold, got {other:?}"),
    };
    assert!(matches!(loser, RegistrationError::CapacityExceeded { .. }));

    h.capacity.confirm(winner.id).await.unwrap();
    let third = h.capacity.reserve(h.event_id, h.ticket_id).await;
    assert!(matches!(
        third,
        Err(RegistrationError::CapacityExceeded { .. })
    ));
    assert_eq!(
        h.store.ticket_seat_usage(h.ticket_id).await,
        SeatUsage {
            held: 0,
            confirmed: 1
        }
    );
}

#[tokio::test]
async fn test_sweep_returns_expired_seats() {
    let h = harness(HarnessOptions {
        capacity: 1,
        hold_ttl_secs: -1,
        ..HarnessOptions::default()
    })
    .await;

    h.capacity.reserve(h.event_id, h.ticket_id).await.unwrap();
    assert_eq!(h.capacity.sweep_expired().await.unwrap(), 1);
    assert_eq!(h.store.event_seat_usage(h.event_id).await.in_use(), 0);
}
