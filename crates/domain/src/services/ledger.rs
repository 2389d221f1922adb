//! Registration ledger.
//!
//! The durable record of a registration and the only writer of its approval
//! and check-in state. Rows are created once per payment intent, after the
//! payment has been confirmed.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{RegistrationError, RegistrationResult};
use crate::models::{
    ApprovalDecision, ApprovalStatus, CreateRegistrationRequest, DocumentReference,
    PaymentConfirmed, PaymentIntentStatus, Registration, RegistrationInsert,
};
use crate::services::documents::validate_document;
use crate::services::notification::{
    NotificationResult, NotificationType, RegistrationNotification, RegistrationNotifier,
};
use crate::services::payment::PaymentIntentCoordinator;
use crate::store::{CatalogStore, RegistrationStore};

#[derive(Clone)]
pub struct RegistrationLedger {
    store: Arc<dyn RegistrationStore>,
    catalog: Arc<dyn CatalogStore>,
    notifier: Arc<dyn RegistrationNotifier>,
}

impl RegistrationLedger {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        catalog: Arc<dyn CatalogStore>,
        notifier: Arc<dyn RegistrationNotifier>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
        }
    }

    pub async fn find(&self, id: Uuid) -> RegistrationResult<Registration> {
        self.store
            .find_registration(id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound("Registration".to_string()))
    }

    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> RegistrationResult<Option<Registration>> {
        self.store.find_by_payment_intent(payment_intent_id).await
    }

    /// Creates the registration for a confirmed payment. Idempotent on the
    /// payment intent id.
    pub async fn record_payment_confirmed(
        &self,
        fact: &PaymentConfirmed,
    ) -> RegistrationResult<RegistrationInsert> {
        if let Some(existing) = self
            .store
            .find_by_payment_intent(&fact.payment_intent_id)
            .await?
        {
            return Ok(RegistrationInsert::Existing(existing));
        }

        let ticket = self
            .catalog
            .find_ticket(fact.ticket_id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound("Ticket".to_string()))?;

        let document = fact
            .document
            .as_ref()
            .filter(|doc| ticket.requires_document && ticket.accepts_document(doc.document_type));

        let now = Utc::now();
        let (approval_status, approved_at) = if ticket.requires_document {
            (ApprovalStatus::Pending, None)
        } else {
            (ApprovalStatus::Approved, Some(now))
        };

        let registration = Registration {
            id: Uuid::new_v4(),
            event_id: fact.event_id,
            ticket_id: fact.ticket_id,
            user_id: fact.user_id.clone(),
            email: fact.email.clone(),
            payment_intent_id: fact.payment_intent_id.clone(),
            upsells: fact.upsells.clone(),
            amount_cents: fact.amount_cents,
            currency: fact.currency.clone(),
            document_required: ticket.requires_document,
            approval_status,
            checked_in: false,
            checked_in_at: None,
            qr_code_token: shared::crypto::generate_token(),
            document_type: document.map(|d| d.document_type),
            document_url: document.map(|d| d.document_url.clone()),
            created_at: now,
            approved_at,
            rejection_reason: None,
        };

        let inserted = self.store.insert_registration(registration).await?;
        if let RegistrationInsert::Created(registration) = &inserted {
            tracing::info!(
                registration_id = %registration.id,
                payment_intent_id = %registration.payment_intent_id,
                event_id = %registration.event_id,
                approval_status = %registration.approval_status,
                "Registration created"
            );
            self.notify(NotificationType::PaymentConfirmed, registration)
                .await;
            if registration.approval_status == ApprovalStatus::Pending
                && registration.document_url.is_none()
            {
                self.notify(NotificationType::DocumentRequired, registration)
                    .await;
            }
        }
        Ok(inserted)
    }

    /// Client confirmation path for `POST /registrations`.
    ///
    /// A `document_ref` is validated against the ticket before the intent is
    /// synced, and is stored on the registration whichever path creates it.
    pub async fn create_from_client(
        &self,
        request: &CreateRegistrationRequest,
        payments: &PaymentIntentCoordinator,
    ) -> RegistrationResult<Registration> {
        let intent = payments.find_intent(&request.payment_intent_id).await?;
        if intent.event_id != request.event_id
            || intent.ticket_id != request.ticket_id
            || intent.user_id != request.user_id
        {
            return Err(RegistrationError::Validation(
                "Registration does not match the payment intent".to_string(),
            ));
        }
        if !request.upsells.is_empty() {
            let mut requested: Vec<&str> = request.upsells.iter().map(|u| u.id.as_str()).collect();
            let mut paid: Vec<&str> = intent.upsells.iter().map(|u| u.id.as_str()).collect();
            requested.sort_unstable();
            paid.sort_unstable();
            if requested != paid {
                return Err(RegistrationError::Validation(
                    "Upsells do not match the payment intent".to_string(),
                ));
            }
        }

        let document = match &request.document_ref {
            Some(document) => {
                let ticket = self
                    .catalog
                    .find_ticket(intent.ticket_id)
                    .await?
                    .ok_or_else(|| RegistrationError::NotFound("Ticket".to_string()))?;
                validate_document(&ticket, document)?;
                Some(document)
            }
            None => None,
        };

        let sync = payments
            .sync_intent_with(&request.payment_intent_id, document)
            .await?;
        let intent = sync.intent;
        if intent.status != PaymentIntentStatus::Succeeded {
            return Err(RegistrationError::PaymentNotConfirmed {
                intent_id: intent.id,
                status: intent.status,
            });
        }

        // The sync itself may have created the row for this caller.
        if let Some(RegistrationInsert::Created(registration)) = sync.registration {
            return Ok(registration);
        }
        if let Some(existing) = self.store.find_by_payment_intent(&intent.id).await? {
            let existing = match document {
                Some(document)
                    if existing.approval_status == ApprovalStatus::Pending
                        && existing.document_url.is_none() =>
                {
                    self.attach_document(existing.id, document).await?
                }
                _ => existing,
            };
            return Err(duplicate(existing));
        }

        let mut fact = intent.confirmation();
        if fact.document.is_none() {
            fact.document = document.cloned();
        }

        match payments.settle_payment(&intent, &fact).await? {
            Some(RegistrationInsert::Created(registration)) => Ok(registration),
            Some(RegistrationInsert::Existing(existing)) => Err(duplicate(existing)),
            None => Err(RegistrationError::CapacityExceeded {
                event_id: intent.event_id,
                ticket_id: intent.ticket_id,
            }),
        }
    }

    /// Approves a pending registration.
    pub async fn approve(&self, id: Uuid) -> RegistrationResult<Registration> {
        let registration = self
            .apply_decision(id, ApprovalDecision::Approve)
            .await?;
        self.notify(NotificationType::RegistrationApproved, &registration)
            .await;
        Ok(registration)
    }

    /// Rejects a pending registration. A non-empty reason is required.
    pub async fn reject(&self, id: Uuid, reason: &str) -> RegistrationResult<Registration> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RegistrationError::Validation(
                "A rejection reason is required".to_string(),
            ));
        }
        let registration = self
            .apply_decision(
                id,
                ApprovalDecision::Reject {
                    reason: reason.to_string(),
                },
            )
            .await?;
        self.notify(NotificationType::DocumentRejected, &registration)
            .await;
        Ok(registration)
    }

    /// Stores a document reference on a pending registration.
    pub async fn attach_document(
        &self,
        id: Uuid,
        document: &DocumentReference,
    ) -> RegistrationResult<Registration> {
        let current = self.find(id).await?;
        if current.approval_status != ApprovalStatus::Pending {
            return Err(not_pending(&current));
        }
        match self.store.attach_document(id, document).await? {
            Some(updated) => Ok(updated),
            None => Err(not_pending(&self.find(id).await?)),
        }
    }

    /// Performs the check-in compare-and-set. Returns the updated row only
    /// when this call moved it to checked in.
    pub async fn check_in(&self, token: &str) -> RegistrationResult<Option<Registration>> {
        self.store.check_in(token, Utc::now()).await
    }

    /// Check-in guard: approved, or no document required.
    pub fn guard(&self, registration: &Registration) -> RegistrationResult<()> {
        if registration.can_check_in() {
            Ok(())
        } else {
            Err(RegistrationError::NotApproved {
                registration_id: registration.id,
                approval_status: registration.approval_status,
            })
        }
    }

    async fn apply_decision(
        &self,
        id: Uuid,
        decision: ApprovalDecision,
    ) -> RegistrationResult<Registration> {
        let current = self.find(id).await?;
        if current.approval_status != ApprovalStatus::Pending {
            return Err(not_pending(&current));
        }

        match self.store.set_approval(id, &decision, Utc::now()).await? {
            Some(updated) => {
                tracing::info!(
                    registration_id = %updated.id,
                    approval_status = %updated.approval_status,
                    "Registration reviewed"
                );
                Ok(updated)
            }
            // Lost a race with another reviewer.
            None => Err(not_pending(&self.find(id).await?)),
        }
    }

    async fn notify(&self, notification_type: NotificationType, registration: &Registration) {
        let notification = RegistrationNotification::new(notification_type, registration);
        if let NotificationResult::Failed(reason) = self.notifier.notify(notification).await {
            tracing::warn!(
                registration_id = %registration.id,
                notification_type = %notification_type,
                reason = %reason,
                "Failed to send registration notification"
            );
        }
    }
}

fn duplicate(existing: Registration) -> RegistrationError {
    tracing::info!(
        registration_id = %existing.id,
        payment_intent_id = %existing.payment_intent_id,
        "Duplicate registration attempt"
    );
    RegistrationError::DuplicateRegistrationAttempt(Box::new(existing))
}

fn not_pending(registration: &Registration) -> RegistrationError {
    RegistrationError::InvalidTransition(format!(
        "registration {} is {}, not pending",
        registration.id, registration.approval_status
    ))
}
