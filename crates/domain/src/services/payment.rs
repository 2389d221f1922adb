//! Payment intent coordination.
//!
//! Prices a purchase, reserves a seat, opens an intent at the processor and
//! turns the processor's status reports into seat confirmations, hold
//! releases and `PaymentConfirmed` facts for the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use uuid::Uuid;

use crate::errors::{RegistrationError, RegistrationResult};
use crate::models::{
    CreatePaymentIntentRequest, CreatePaymentIntentResponse, DocumentReference, HoldConfirmation,
    PaymentConfirmed, PaymentIntent, PaymentIntentStatus, ProcessorWebhookEvent,
    RegistrationInsert, Upsell,
};
use crate::services::capacity::CapacityAllocator;
use crate::services::documents::validate_document;
use crate::services::ledger::RegistrationLedger;
use crate::services::pricing;
use crate::services::processor::{PaymentProcessor, ProcessorError, ProcessorIntentRequest};
use crate::store::{CatalogStore, IntentInsert, PaymentIntentStore};

/// Payment settings the coordinator needs at runtime.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub webhook_secret: String,
    pub webhook_tolerance_secs: i64,
    pub idempotency_window_secs: i64,
    pub intent_timeout_secs: i64,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            webhook_tolerance_secs: 300,
            idempotency_window_secs: 86_400,
            intent_timeout_secs: 1_800,
        }
    }
}

/// Input to [`PaymentIntentCoordinator::create_intent`].
#[derive(Debug, Clone)]
pub struct CreateIntentCommand {
    pub user_id: String,
    pub email: String,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub upsells: Vec<Upsell>,
    pub document: Option<DocumentReference>,
}

impl From<CreatePaymentIntentRequest> for CreateIntentCommand {
    fn from(request: CreatePaymentIntentRequest) -> Self {
        Self {
            user_id: request.user_id,
            email: request.email,
            event_id: request.event_id,
            ticket_id: request.ticket_id,
            upsells: request.upsells,
            document: request.document,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIntent {
    pub client_secret: String,
    pub intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub reused: bool,
}

impl CreatedIntent {
    fn from_intent(intent: &PaymentIntent, reused: bool) -> Self {
        Self {
            client_secret: intent.client_secret.clone(),
            intent_id: intent.id.clone(),
            amount_cents: intent.amount_cents,
            currency: intent.currency.clone(),
            reused,
        }
    }
}

impl From<CreatedIntent> for CreatePaymentIntentResponse {
    fn from(created: CreatedIntent) -> Self {
        Self {
            client_secret: created.client_secret,
            intent_id: created.intent_id,
            amount_cents: created.amount_cents,
            currency: created.currency,
            reused: created.reused,
        }
    }
}

/// Result of applying a processor status to a local intent.
#[derive(Debug, Clone)]
pub struct StatusApplication {
    pub intent: PaymentIntent,
    /// False for replays and non-terminal statuses.
    pub applied: bool,
    /// Set when a succeeded payment was handed to the ledger.
    pub registration: Option<RegistrationInsert>,
}

/// Result of [`PaymentIntentCoordinator::sync_intent`].
#[derive(Debug, Clone)]
pub struct IntentSync {
    pub intent: PaymentIntent,
    pub registration: Option<RegistrationInsert>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub intent_id: String,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentExpiryReport {
    pub cancelled: u64,
    /// Stale intents the processor reported as paid.
    pub settled: u64,
    /// Intents left for the next sweep because the processor was unreachable.
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub repaired: u64,
    pub unresolved: u64,
}

/// Derives the idempotency key for a purchase.
pub fn idempotency_key(
    user_id: &str,
    event_id: Uuid,
    ticket_id: Uuid,
    upsells: &[Upsell],
    total_cents: i64,
) -> String {
    let mut upsell_ids: Vec<&str> = upsells.iter().map(|u| u.id.as_str()).collect();
    upsell_ids.sort_unstable();
    shared::crypto::sha256_hex(&format!(
        "{}|{}|{}|{}|{}",
        user_id,
        event_id,
        ticket_id,
        upsell_ids.join(","),
        total_cents
    ))
}

/// Key sent to the processor for the `attempt`-th intent of a purchase.
///
/// The first attempt uses the purchase key itself. Later attempts follow a
/// failed or cancelled intent and need a key the processor has not seen.
pub fn processor_idempotency_key(key: &str, attempt: u64) -> String {
    if attempt == 0 {
        key.to_string()
    } else {
        format!("{}-{}", key, attempt)
    }
}

#[derive(Clone)]
pub struct PaymentIntentCoordinator {
    catalog: Arc<dyn CatalogStore>,
    intents: Arc<dyn PaymentIntentStore>,
    capacity: CapacityAllocator,
    ledger: RegistrationLedger,
    processor: Arc<dyn PaymentProcessor>,
    settings: PaymentSettings,
}

impl PaymentIntentCoordinator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        intents: Arc<dyn PaymentIntentStore>,
        capacity: CapacityAllocator,
        ledger: RegistrationLedger,
        processor: Arc<dyn PaymentProcessor>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            catalog,
            intents,
            capacity,
            ledger,
            processor,
            settings,
        }
    }

    pub async fn find_intent(&self, intent_id: &str) -> RegistrationResult<PaymentIntent> {
        self.intents
            .find_intent(intent_id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound("Payment intent".to_string()))
    }

    /// Opens (or reuses) a payment intent for one seat.
    pub async fn create_intent(
        &self,
        command: CreateIntentCommand,
    ) -> RegistrationResult<CreatedIntent> {
        let event = self
            .catalog
            .find_event(command.event_id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound("Event".to_string()))?;
        let ticket = self
            .catalog
            .find_ticket(command.ticket_id)
            .await?
            .filter(|ticket| ticket.event_id == event.id)
            .ok_or_else(|| RegistrationError::NotFound("Ticket".to_string()))?;
        if !event.is_on_sale() {
            return Err(RegistrationError::EventNotOnSale(event.id));
        }
        if let Some(document) = &command.document {
            validate_document(&ticket, document)?;
        }

        let now = Utc::now();
        let tiers = self.catalog.list_price_tiers(event.id).await?;
        let quote = pricing::quote(&ticket, &tiers, &command.upsells, now)?;
        let key = idempotency_key(
            &command.user_id,
            event.id,
            ticket.id,
            &command.upsells,
            quote.total_cents,
        );

        let window_start = now - Duration::seconds(self.settings.idempotency_window_secs);
        if let Some(existing) = self.intents.find_live_by_key(&key, window_start).await? {
            tracing::info!(
                intent_id = %existing.id,
                user_id = %command.user_id,
                "Reusing payment intent for identical request"
            );
            return Ok(CreatedIntent::from_intent(&existing, true));
        }

        let attempt = self.intents.count_closed_by_key(&key).await?;
        let hold = self.capacity.reserve(event.id, ticket.id).await?;

        // Only purchase-level fields: a keyed retry must resend identical parameters.
        let mut metadata = HashMap::new();
        metadata.insert("event_id".to_string(), event.id.to_string());
        metadata.insert("ticket_id".to_string(), ticket.id.to_string());
        metadata.insert("user_id".to_string(), command.user_id.clone());

        let request = ProcessorIntentRequest {
            amount_cents: quote.total_cents,
            currency: ticket.currency.clone(),
            idempotency_key: processor_idempotency_key(&key, attempt),
            metadata,
        };
        let remote = match self.processor.create_intent(request).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    hold_id = %hold.id,
                    event_id = %event.id,
                    "Payment processor failed to create intent"
                );
                self.release_quietly(hold.id).await;
                return Err(RegistrationError::PaymentIntentCreationFailed(e.to_string()));
            }
        };

        let intent = PaymentIntent {
            id: remote.id,
            idempotency_key: key,
            user_id: command.user_id,
            email: command.email,
            event_id: event.id,
            ticket_id: ticket.id,
            hold_id: hold.id,
            upsells: command.upsells,
            amount_cents: quote.total_cents,
            currency: ticket.currency,
            client_secret: remote.client_secret,
            status: PaymentIntentStatus::RequiresPayment,
            document: command.document,
            price_tier_id: quote.tier_id,
            created_at: now,
            updated_at: now,
        };

        let inserted = match self.intents.insert_intent(intent).await {
            Ok(inserted) => inserted,
            Err(e) => {
                self.release_quietly(hold.id).await;
                return Err(e);
            }
        };

        match inserted {
            IntentInsert::Inserted(intent) => {
                tracing::info!(
                    intent_id = %intent.id,
                    hold_id = %intent.hold_id,
                    amount_cents = intent.amount_cents,
                    currency = %intent.currency,
                    "Payment intent created"
                );
                Ok(CreatedIntent::from_intent(&intent, false))
            }
            IntentInsert::Existing(existing) => {
                // A concurrent identical request won the insert.
                self.release_quietly(hold.id).await;
                if existing.status.is_live() {
                    Ok(CreatedIntent::from_intent(&existing, true))
                } else {
                    Err(RegistrationError::PaymentIntentCreationFailed(format!(
                        "processor returned intent {} which is already {}",
                        existing.id, existing.status
                    )))
                }
            }
        }
    }

    /// Verifies and applies a processor webhook.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> RegistrationResult<WebhookOutcome> {
        let verified = match signature_header {
            Some(header) => shared::crypto::verify_webhook_signature(
                &self.settings.webhook_secret,
                header,
                payload,
                Utc::now().timestamp(),
                self.settings.webhook_tolerance_secs,
            )
            .map_err(|e| e.to_string()),
            None => Err("missing signature header".to_string()),
        };
        if let Err(reason) = verified {
            counter!("payment_webhooks_total", "outcome" => "invalid_signature").increment(1);
            tracing::warn!(reason = %reason, "Rejected payment webhook");
            return Err(RegistrationError::WebhookSignatureInvalid(reason));
        }

        let event: ProcessorWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| RegistrationError::Validation(format!("Invalid webhook body: {}", e)))?;

        let applied = match self
            .apply_processor_status(&event.data.intent_id, event.data.status)
            .await
        {
            Ok(application) => application.applied,
            Err(RegistrationError::NotFound(_)) => {
                counter!("payment_webhooks_total", "outcome" => "unknown_intent").increment(1);
                tracing::warn!(
                    event_id = %event.id,
                    intent_id = %event.data.intent_id,
                    "Webhook for unknown payment intent"
                );
                return Ok(WebhookOutcome {
                    event_id: event.id,
                    intent_id: event.data.intent_id,
                    applied: false,
                });
            }
            Err(e) => return Err(e),
        };

        let outcome = if applied { "applied" } else { "replayed" };
        counter!("payment_webhooks_total", "outcome" => outcome).increment(1);
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            intent_id = %event.data.intent_id,
            status = %event.data.status,
            applied = applied,
            "Payment webhook processed"
        );

        Ok(WebhookOutcome {
            event_id: event.id,
            intent_id: event.data.intent_id,
            applied,
        })
    }

    /// Moves an intent to a terminal status and performs its side effects.
    /// Replays are no-ops.
    pub async fn apply_processor_status(
        &self,
        intent_id: &str,
        status: PaymentIntentStatus,
    ) -> RegistrationResult<StatusApplication> {
        self.apply_status_with(intent_id, status, None).await
    }

    /// As [`apply_processor_status`](Self::apply_processor_status), recording
    /// `document` on the registration when the intent itself carries none.
    async fn apply_status_with(
        &self,
        intent_id: &str,
        status: PaymentIntentStatus,
        document: Option<&DocumentReference>,
    ) -> RegistrationResult<StatusApplication> {
        if !status.is_terminal() {
            let intent = self.find_intent(intent_id).await?;
            return Ok(StatusApplication {
                intent,
                applied: false,
                registration: None,
            });
        }

        let Some(intent) = self
            .intents
            .transition_intent(intent_id, status, Utc::now())
            .await?
        else {
            let intent = self.find_intent(intent_id).await?;
            if status == PaymentIntentStatus::Succeeded
                && intent.status != PaymentIntentStatus::Succeeded
            {
                tracing::error!(
                    intent_id = %intent.id,
                    local_status = %intent.status,
                    "Processor reports payment for an intent closed locally"
                );
            }
            return Ok(StatusApplication {
                intent,
                applied: false,
                registration: None,
            });
        };

        let registration = match status {
            PaymentIntentStatus::Succeeded => {
                let mut fact = intent.confirmation();
                if fact.document.is_none() {
                    fact.document = document.cloned();
                }
                self.settle_payment(&intent, &fact).await?
            }
            _ => {
                self.capacity.release(intent.hold_id).await?;
                None
            }
        };

        Ok(StatusApplication {
            intent,
            applied: true,
            registration,
        })
    }

    /// Brings a still-open intent up to date with the processor.
    pub async fn sync_intent(&self, intent_id: &str) -> RegistrationResult<IntentSync> {
        self.sync_intent_with(intent_id, None).await
    }

    /// Syncs an intent, settling a payment found succeeded with `document`
    /// as the registration's document. The caller validates `document`.
    pub async fn sync_intent_with(
        &self,
        intent_id: &str,
        document: Option<&DocumentReference>,
    ) -> RegistrationResult<IntentSync> {
        let intent = self.find_intent(intent_id).await?;
        if intent.status != PaymentIntentStatus::RequiresPayment {
            return Ok(IntentSync {
                intent,
                registration: None,
            });
        }

        let remote = match self.processor.retrieve_intent(intent_id).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    intent_id = %intent_id,
                    "Could not refresh payment intent from processor"
                );
                return Ok(IntentSync {
                    intent,
                    registration: None,
                });
            }
        };

        let application = self
            .apply_status_with(intent_id, remote.status, document)
            .await?;
        Ok(IntentSync {
            intent: application.intent,
            registration: application.registration,
        })
    }

    /// Cancels intents that stayed unpaid past the intent timeout.
    pub async fn expire_stale_intents(&self) -> RegistrationResult<IntentExpiryReport> {
        let cutoff = Utc::now() - Duration::seconds(self.settings.intent_timeout_secs);
        let stale = self.intents.list_stale_intents(cutoff).await?;
        let mut report = IntentExpiryReport::default();

        for intent in stale {
            let status = match self.processor.cancel_intent(&intent.id).await {
                Ok(remote) if remote.status == PaymentIntentStatus::Succeeded => {
                    PaymentIntentStatus::Succeeded
                }
                Ok(remote) if remote.status == PaymentIntentStatus::Failed => {
                    PaymentIntentStatus::Failed
                }
                Ok(_) | Err(ProcessorError::NotFound(_)) => PaymentIntentStatus::Cancelled,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        intent_id = %intent.id,
                        "Could not cancel stale intent at processor"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            match self.apply_processor_status(&intent.id, status).await {
                Ok(application) if application.applied => {
                    if status == PaymentIntentStatus::Succeeded {
                        report.settled += 1;
                    } else {
                        report.cancelled += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        intent_id = %intent.id,
                        "Failed to expire stale intent"
                    );
                    report.skipped += 1;
                }
            }
        }

        if report != IntentExpiryReport::default() {
            tracing::info!(
                cancelled = report.cancelled,
                settled = report.settled,
                skipped = report.skipped,
                "Stale payment intents processed"
            );
        }
        Ok(report)
    }

    /// Hands succeeded intents without a registration back to the ledger.
    pub async fn reconcile_confirmed(&self) -> RegistrationResult<ReconciliationReport> {
        let orphaned = self.intents.list_unregistered_succeeded().await?;
        let mut report = ReconciliationReport::default();

        for intent in orphaned {
            match self.settle_payment(&intent, &intent.confirmation()).await {
                Ok(Some(_)) => report.repaired += 1,
                Ok(None) => report.unresolved += 1,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        intent_id = %intent.id,
                        "Failed to reconcile paid intent"
                    );
                    report.unresolved += 1;
                }
            }
        }

        if report.repaired > 0 {
            tracing::info!(repaired = report.repaired, "Reconciled paid intents");
        }
        if report.unresolved > 0 {
            tracing::error!(
                unresolved = report.unresolved,
                "Paid intents still without a registration"
            );
        }
        Ok(report)
    }

    /// Secures a seat for a paid intent and records the registration.
    /// Returns `None` when no seat could be secured.
    pub(crate) async fn settle_payment(
        &self,
        intent: &PaymentIntent,
        fact: &PaymentConfirmed,
    ) -> RegistrationResult<Option<RegistrationInsert>> {
        if !self.secure_seat(intent).await? {
            counter!("paid_intents_without_seat_total").increment(1);
            tracing::error!(
                intent_id = %intent.id,
                event_id = %intent.event_id,
                ticket_id = %intent.ticket_id,
                "Paid intent has no seat; left for reconciliation"
            );
            return Ok(None);
        }

        let inserted = self.ledger.record_payment_confirmed(fact).await?;
        Ok(Some(inserted))
    }

    async fn secure_seat(&self, intent: &PaymentIntent) -> RegistrationResult<bool> {
        match self.capacity.confirm(intent.hold_id).await? {
            HoldConfirmation::Confirmed | HoldConfirmation::AlreadyConfirmed => Ok(true),
            HoldConfirmation::Lapsed => {
                let hold = match self.capacity.reserve(intent.event_id, intent.ticket_id).await {
                    Ok(hold) => hold,
                    Err(RegistrationError::CapacityExceeded { .. })
                    | Err(RegistrationError::EventNotOnSale(_)) => return Ok(false),
                    Err(e) => return Err(e),
                };
                self.intents
                    .update_intent_hold(&intent.id, hold.id, Utc::now())
                    .await?;
                self.capacity.confirm(hold.id).await?;
                tracing::info!(
                    intent_id = %intent.id,
                    hold_id = %hold.id,
                    "Re-reserved seat for late payment"
                );
                Ok(true)
            }
        }
    }

    async fn release_quietly(&self, hold_id: Uuid) {
        if let Err(e) = self.capacity.release(hold_id).await {
            tracing::error!(error = %e, hold_id = %hold_id, "Failed to release capacity hold");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsell(id: &str, price_cents: i64) -> Upsell {
        Upsell {
            id: id.to_string(),
            price_cents,
        }
    }

    #[test]
    fn test_idempotency_key_ignores_upsell_order() {
        let event_id = Uuid::new_v4();
        let ticket_id = Uuid::new_v4();
        let a = idempotency_key(
            "user-1",
            event_id,
            ticket_id,
            &[upsell("tshirt", 1_500), upsell("photo", 900)],
            12_400,
        );
        let b = idempotency_key(
            "user-1",
            event_id,
            ticket_id,
            &[upsell("photo", 900), upsell("tshirt", 1_500)],
            12_400,
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_idempotency_key_changes_with_total_and_user() {
        let event_id = Uuid::new_v4();
        let ticket_id = Uuid::new_v4();
        let base = idempotency_key("user-1", event_id, ticket_id, &[], 10_000);
        assert_ne!(
            base,
            idempotency_key("user-1", event_id, ticket_id, &[], 9_000)
        );
        assert_ne!(
            base,
            idempotency_key("user-2", event_id, ticket_id, &[], 10_000)
        );
    }

    #[test]
    fn test_processor_key_changes_per_attempt() {
        assert_eq!(processor_idempotency_key("abc", 0), "abc");
        assert_eq!(processor_idempotency_key("abc", 1), "abc-1");
        assert_ne!(
            processor_idempotency_key("abc", 1),
            processor_idempotency_key("abc", 2)
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = PaymentSettings::default();
        assert_eq!(settings.idempotency_window_secs, 86_400);
        assert_eq!(settings.webhook_tolerance_secs, 300);
    }
}
