//! Check-in service.
//!
//! Consumes a scanned token exactly once: the first valid scan flips the
//! registration to checked in and bumps the event counter, later scans of
//! the same token succeed without touching anything.

use std::sync::Arc;

use metrics::counter;
use uuid::Uuid;

use crate::errors::{RegistrationError, RegistrationResult};
use crate::models::{CheckInOutcome, CounterDrift, EventCheckinCounter, EventOverview};
use crate::services::ledger::RegistrationLedger;
use crate::store::RegistrationStore;

#[derive(Clone)]
pub struct CheckInService {
    ledger: RegistrationLedger,
    store: Arc<dyn RegistrationStore>,
}

impl CheckInService {
    pub fn new(ledger: RegistrationLedger, store: Arc<dyn RegistrationStore>) -> Self {
        Self { ledger, store }
    }

    /// Validates a token and checks its holder in.
    pub async fn validate_and_check_in(&self, token: &str) -> RegistrationResult<CheckInOutcome> {
        let token = token.trim();
        if token.is_empty() {
            counter!("checkins_total", "result" => "invalid_token").increment(1);
            return Err(RegistrationError::InvalidOrUnknownToken);
        }

        if let Some(registration) = self.ledger.check_in(token).await? {
            counter!("checkins_total", "result" => "checked_in").increment(1);
            tracing::info!(
                registration_id = %registration.id,
                event_id = %registration.event_id,
                "Participant checked in"
            );
            return Ok(CheckInOutcome {
                registration,
                already_checked_in: false,
            });
        }

        // The compare-and-set did not fire: explain why.
        let Some(registration) = self.store.find_by_token(token).await? else {
            counter!("checkins_total", "result" => "invalid_token").increment(1);
            tracing::warn!("Check-in attempted with unknown token");
            return Err(RegistrationError::InvalidOrUnknownToken);
        };

        if registration.checked_in {
            counter!("checkins_total", "result" => "already_checked_in").increment(1);
            return Ok(CheckInOutcome {
                registration,
                already_checked_in: true,
            });
        }

        if let Err(e) = self.ledger.guard(&registration) {
            counter!("checkins_total", "result" => "not_approved").increment(1);
            tracing::info!(
                registration_id = %registration.id,
                approval_status = %registration.approval_status,
                "Check-in refused: registration not approved"
            );
            return Err(e);
        }

        // Approved between the two reads.
        match self.ledger.check_in(token).await? {
            Some(registration) => {
                counter!("checkins_total", "result" => "checked_in").increment(1);
                Ok(CheckInOutcome {
                    registration,
                    already_checked_in: false,
                })
            }
            None => {
                let registration = self
                    .store
                    .find_by_token(token)
                    .await?
                    .ok_or(RegistrationError::InvalidOrUnknownToken)?;
                counter!("checkins_total", "result" => "already_checked_in").increment(1);
                Ok(CheckInOutcome {
                    already_checked_in: registration.checked_in,
                    registration,
                })
            }
        }
    }

    /// Registrations and ledger-derived statistics for one event.
    pub async fn event_overview(&self, event_id: Uuid) -> RegistrationResult<EventOverview> {
        let registrations = self.store.list_for_event(event_id).await?;
        let stats = self.store.checkin_stats(event_id).await?;
        Ok(EventOverview {
            registrations,
            stats,
        })
    }

    pub async fn cached_counter(
        &self,
        event_id: Uuid,
    ) -> RegistrationResult<Option<EventCheckinCounter>> {
        self.store.find_checkin_counter(event_id).await
    }

    /// Recomputes every cached counter from the ledger.
    pub async fn reconcile_counters(&self) -> RegistrationResult<Vec<CounterDrift>> {
        let drifts = self
            .store
            .reconcile_checkin_counters(chrono::Utc::now())
            .await?;
        for drift in &drifts {
            tracing::warn!(
                event_id = %drift.event_id,
                cached = drift.cached,
                actual = drift.actual,
                "Check-in counter drift corrected"
            );
        }
        Ok(drifts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ApprovalStatus, DocumentType, PaymentConfirmed, Registration, RegistrationInsert, Ticket,
    };
    use crate::services::notification::MockRegistrationNotifier;
    use crate::store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        ledger: RegistrationLedger,
        service: CheckInService,
        event_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let ledger = RegistrationLedger::new(
            store.clone(),
            store.clone(),
            Arc::new(MockRegistrationNotifier::new()),
        );
        Fixture {
            service: CheckInService::new(ledger.clone(), store.clone()),
            store,
            ledger,
            event_id: Uuid::new_v4(),
        }
    }

    async fn register(fixture: &Fixture, requires_document: bool) -> Registration {
        let ticket_id = Uuid::new_v4();
        fixture
            .store
            .insert_ticket(Ticket {
                id: ticket_id,
                event_id: fixture.event_id,
                name: "Wave".to_string(),
                base_price_cents: 2_000,
                currency: "eur".to_string(),
                max_participants: 0,
                requires_document,
                document_types: vec![DocumentType::MedicalCertificate],
            })
            .await;
        let inserted = fixture
            .ledger
            .record_payment_confirmed(&PaymentConfirmed {
                payment_intent_id: format!("pi_{}", Uuid::new_v4().simple()),
                user_id: "user-1".to_string(),
                email: "runner@example.com".to_string(),
                event_id: fixture.event_id,
                ticket_id,
                upsells: vec![],
                amount_cents: 2_000,
                currency: "eur".to_string(),
                document: None,
            })
            .await
            .unwrap();
        match inserted {
            RegistrationInsert::Created(r) => r,
            RegistrationInsert::Existing(_) => panic!("expected a new registration"),
        }
    }

    #[tokio::test]
    async fn test_second_scan_reports_already_checked_in() {
        let fixture = fixture().await;
        let registration = register(&fixture, false).await;

        let first = fixture
            .service
            .validate_and_check_in(&registration.qr_code_token)
            .await
            .unwrap();
        let second = fixture
            .service
            .validate_and_check_in(&registration.qr_code_token)
            .await
            .unwrap();

        assert!(!first.already_checked_in);
        assert!(second.already_checked_in);
        assert!(first.registration.checked_in_at.is_some());
        assert_eq!(
            fixture
                .service
                .cached_counter(fixture.event_id)
                .await
                .unwrap()
                .unwrap()
                .checked_in,
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_and_blank_tokens() {
        let fixture = fixture().await;
        for token in ["", "   ", "not-a-real-token"] {
            assert!(matches!(
                fixture.service.validate_and_check_in(token).await,
                Err(RegistrationError::InvalidOrUnknownToken)
            ));
        }
    }

    #[tokio::test]
    async fn test_pending_document_blocks_check_in() {
        let fixture = fixture().await;
        let registration = register(&fixture, true).await;
        assert_eq!(registration.approval_status, ApprovalStatus::Pending);

        let err = fixture
            .service
            .validate_and_check_in(&registration.qr_code_token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::NotApproved {
                approval_status: ApprovalStatus::Pending,
                ..
            }
        ));

        fixture.ledger.approve(registration.id).await.unwrap();
        let outcome = fixture
            .service
            .validate_and_check_in(&registration.qr_code_token)
            .await
            .unwrap();
        assert!(!outcome.already_checked_in);
    }

    #[tokio::test]
    async fn test_overview_stats() {
        let fixture = fixture().await;
        let a = register(&fixture, false).await;
        register(&fixture, false).await;
        register(&fixture, true).await;

        fixture
            .service
            .validate_and_check_in(&a.qr_code_token)
            .await
            .unwrap();

        let overview = fixture.service.event_overview(fixture.event_id).await.unwrap();
        assert_eq!(overview.registrations.len(), 3);
        assert_eq!(overview.stats.total, 3);
        assert_eq!(overview.stats.checked_in, 1);
        assert_eq!(overview.stats.pending, 2);
    }

    #[tokio::test]
    async fn test_reconcile_corrects_drift() {
        let fixture = fixture().await;
        let registration = register(&fixture, false).await;
        fixture
            .service
            .validate_and_check_in(&registration.qr_code_token)
            .await
            .unwrap();
        fixture.store.set_checkin_counter(fixture.event_id, 7).await;

        let drifts = fixture.service.reconcile_counters().await.unwrap();
        assert_eq!(
            drifts,
            vec![CounterDrift {
                event_id: fixture.event_id,
                cached: 7,
                actual: 1
            }]
        );
        assert!(fixture.service.reconcile_counters().await.unwrap().is_empty());
    }
}
