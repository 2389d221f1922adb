//! Storage seams for the registration core.
//!
//! Each trait method is a single atomic operation. Implementations must not
//! split a conditional update into a read followed by a write: PostgreSQL
//! repositories use conditional `UPDATE ... RETURNING` inside a transaction,
//! the in-memory store performs the whole operation under one lock.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::RegistrationResult;
use crate::models::{
    ApprovalDecision, CapacityHold, CheckinStats, CounterDrift, DocumentReference, Event,
    EventCheckinCounter, HoldConfirmation, PaymentIntent, PaymentIntentStatus, PriceTier,
    Registration, RegistrationInsert, ReserveOutcome, Ticket,
};

pub use memory::InMemoryStore;

/// Read-only access to catalog data.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_event(&self, event_id: Uuid) -> RegistrationResult<Option<Event>>;

    async fn find_ticket(&self, ticket_id: Uuid) -> RegistrationResult<Option<Ticket>>;

    async fn list_price_tiers(&self, event_id: Uuid) -> RegistrationResult<Vec<PriceTier>>;
}

/// Seat holds and seat counters.
#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// Atomically checks both the ticket limit and the event capacity and,
    /// when a seat is free, increments the held counters and inserts a hold.
    async fn try_reserve(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RegistrationResult<ReserveOutcome>;

    /// Moves an active hold's seat from held to confirmed.
    async fn confirm_hold(&self, hold_id: Uuid) -> RegistrationResult<HoldConfirmation>;

    /// Frees an active hold's seat. Returns false when the hold was not active.
    async fn release_hold(&self, hold_id: Uuid) -> RegistrationResult<bool>;

    /// Expires every active hold whose `expires_at` is before `now`.
    async fn expire_holds(&self, now: DateTime<Utc>) -> RegistrationResult<u64>;

    async fn find_hold(&self, hold_id: Uuid) -> RegistrationResult<Option<CapacityHold>>;
}

/// Outcome of inserting a payment intent record.
#[derive(Debug, Clone)]
pub enum IntentInsert {
    Inserted(PaymentIntent),
    /// Another caller already stored an open intent for the same key or id.
    Existing(PaymentIntent),
}

/// Payment intent records.
#[async_trait]
pub trait PaymentIntentStore: Send + Sync {
    /// Most recent live intent for `key` created at or after `since`.
    async fn find_live_by_key(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> RegistrationResult<Option<PaymentIntent>>;

    /// Number of intents for `key` that have left `requires_payment`.
    async fn count_closed_by_key(&self, key: &str) -> RegistrationResult<u64>;

    async fn insert_intent(&self, intent: PaymentIntent) -> RegistrationResult<IntentInsert>;

    async fn find_intent(&self, intent_id: &str) -> RegistrationResult<Option<PaymentIntent>>;

    /// Moves an intent out of `requires_payment`. Returns `None` when the
    /// intent is unknown or already terminal.
    async fn transition_intent(
        &self,
        intent_id: &str,
        status: PaymentIntentStatus,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<PaymentIntent>>;

    /// Points an intent at a replacement hold after its original one lapsed.
    async fn update_intent_hold(
        &self,
        intent_id: &str,
        hold_id: Uuid,
        at: DateTime<Utc>,
    ) -> RegistrationResult<()>;

    /// Intents still in `requires_payment` created before `created_before`.
    async fn list_stale_intents(
        &self,
        created_before: DateTime<Utc>,
    ) -> RegistrationResult<Vec<PaymentIntent>>;

    /// Succeeded intents with no registration row.
    async fn list_unregistered_succeeded(&self) -> RegistrationResult<Vec<PaymentIntent>>;
}

/// Registration ledger rows and check-in counters.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Inserts a registration unless one exists for the same payment intent.
    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> RegistrationResult<RegistrationInsert>;

    async fn find_registration(&self, id: Uuid) -> RegistrationResult<Option<Registration>>;

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> RegistrationResult<Option<Registration>>;

    async fn find_by_token(&self, token: &str) -> RegistrationResult<Option<Registration>>;

    /// Applies a decision only while the registration is pending.
    async fn set_approval(
        &self,
        id: Uuid,
        decision: &ApprovalDecision,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<Registration>>;

    /// Stores a document reference only while the registration is pending.
    async fn attach_document(
        &self,
        id: Uuid,
        document: &DocumentReference,
    ) -> RegistrationResult<Option<Registration>>;

    /// Compare-and-set check-in plus counter increment. Returns the updated
    /// registration only when this call performed the transition.
    async fn check_in(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<Registration>>;

    async fn list_for_event(&self, event_id: Uuid) -> RegistrationResult<Vec<Registration>>;

    async fn checkin_stats(&self, event_id: Uuid) -> RegistrationResult<CheckinStats>;

    async fn find_checkin_counter(
        &self,
        event_id: Uuid,
    ) -> RegistrationResult<Option<EventCheckinCounter>>;

    /// Recomputes every cached counter and reports the ones that drifted.
    async fn reconcile_checkin_counters(
        &self,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Vec<CounterDrift>>;
}
