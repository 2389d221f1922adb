//! In-memory store used for development and tests.
//!
//! Every operation runs inside a single `tokio::sync::Mutex` critical section,
//! which gives the same atomicity the PostgreSQL repositories get from
//! conditional updates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CapacityStore, CatalogStore, IntentInsert, PaymentIntentStore, RegistrationStore};
use crate::errors::{RegistrationError, RegistrationResult};
use crate::models::{
    ApprovalDecision, ApprovalStatus, CapacityHold, CheckinStats, CounterDrift,
    DocumentReference, Event, EventCheckinCounter, HoldConfirmation, HoldStatus, PaymentIntent,
    PaymentIntentStatus, PriceTier, Registration, RegistrationInsert, ReserveOutcome, SeatUsage,
    Ticket,
};

#[derive(Debug, Default)]
struct MemoryState {
    events: HashMap<Uuid, Event>,
    tickets: HashMap<Uuid, Ticket>,
    price_tiers: Vec<PriceTier>,
    event_seats: HashMap<Uuid, SeatUsage>,
    ticket_seats: HashMap<Uuid, SeatUsage>,
    holds: HashMap<Uuid, CapacityHold>,
    intents: HashMap<String, PaymentIntent>,
    registrations: HashMap<Uuid, Registration>,
    registration_by_intent: HashMap<String, Uuid>,
    registration_by_token: HashMap<String, Uuid>,
    checkin_counters: HashMap<Uuid, EventCheckinCounter>,
}

impl MemoryState {
    /// Returns a held seat to the pool on both counters.
    fn free_held_seat(&mut self, event_id: Uuid, ticket_id: Uuid, seats: i32) {
        if let Some(usage) = self.event_seats.get_mut(&event_id) {
            usage.held = (usage.held - seats).max(0);
        }
        if let Some(usage) = self.ticket_seats.get_mut(&ticket_id) {
            usage.held = (usage.held - seats).max(0);
        }
    }

    fn expire_where<F>(&mut self, now: DateTime<Utc>, filter: F) -> u64
    where
        F: Fn(&CapacityHold) -> bool,
    {
        let expired: Vec<(Uuid, Uuid, i32)> = self
            .holds
            .values_mut()
            .filter(|hold| hold.is_expired_at(now) && filter(hold))
            .map(|hold| {
                hold.status = HoldStatus::Expired;
                (hold.event_id, hold.ticket_id, hold.seats)
            })
            .collect();

        for (event_id, ticket_id, seats) in &expired {
            self.free_held_seat(*event_id, *ticket_id, *seats);
        }
        expired.len() as u64
    }
}

/// Thread-safe in-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an event.
    pub async fn insert_event(&self, event: Event) {
        let mut state = self.state.lock().await;
        state.event_seats.entry(event.id).or_default();
        state.events.insert(event.id, event);
    }

    /// Seeds a ticket.
    pub async fn insert_ticket(&self, ticket: Ticket) {
        let mut state = self.state.lock().await;
        state.ticket_seats.entry(ticket.id).or_default();
        state.tickets.insert(ticket.id, ticket);
    }

    /// Seeds a price tier.
    pub async fn insert_price_tier(&self, tier: PriceTier) {
        self.state.lock().await.price_tiers.push(tier);
    }

    pub async fn event_seat_usage(&self, event_id: Uuid) -> SeatUsage {
        self.state
            .lock()
            .await
            .event_seats
            .get(&event_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn ticket_seat_usage(&self, ticket_id: Uuid) -> SeatUsage {
        self.state
            .lock()
            .await
            .ticket_seats
            .get(&ticket_id)
            .copied()
            .unwrap_or_default()
    }

    /// Overwrites a cached check-in counter.
    pub async fn set_checkin_counter(&self, event_id: Uuid, checked_in: i64) {
        self.state.lock().await.checkin_counters.insert(
            event_id,
            EventCheckinCounter {
                event_id,
                checked_in,
                reconciled_at: None,
            },
        );
    }

    pub async fn intent_count(&self) -> usize {
        self.state.lock().await.intents.len()
    }

    pub async fn registration_count(&self) -> usize {
        self.state.lock().await.registrations.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_event(&self, event_id: Uuid) -> RegistrationResult<Option<Event>> {
        Ok(self.state.lock().await.events.get(&event_id).cloned())
    }

    async fn find_ticket(&self, ticket_id: Uuid) -> RegistrationResult<Option<Ticket>> {
        Ok(self.state.lock().await.tickets.get(&ticket_id).cloned())
    }

    async fn list_price_tiers(&self, event_id: Uuid) -> RegistrationResult<Vec<PriceTier>> {
        Ok(self
            .state
            .lock()
            .await
            .price_tiers
            .iter()
            .filter(|tier| tier.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CapacityStore for InMemoryStore {
    async fn try_reserve(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RegistrationResult<ReserveOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let (capacity, on_sale) = match state.events.get(&event_id) {
            Some(event) => (event.capacity, event.is_on_sale()),
            None => return Ok(ReserveOutcome::NotFound),
        };
        let ticket_limit = match state.tickets.get(&ticket_id) {
            Some(ticket) if ticket.event_id == event_id => ticket.max_participants,
            _ => return Ok(ReserveOutcome::NotFound),
        };
        if !on_sale {
            return Ok(ReserveOutcome::EventNotOnSale);
        }

        state.expire_where(now, |hold| hold.event_id == event_id);

        let event_usage = state.event_seats.get(&event_id).copied().unwrap_or_default();
        if event_usage.in_use() >= capacity {
            return Ok(ReserveOutcome::Exhausted);
        }
        let ticket_usage = state.ticket_seats.get(&ticket_id).copied().unwrap_or_default();
        if ticket_limit > 0 && ticket_usage.in_use() >= ticket_limit {
            return Ok(ReserveOutcome::Exhausted);
        }

        state.event_seats.entry(event_id).or_default().held += 1;
        state.ticket_seats.entry(ticket_id).or_default().held += 1;

        let hold = CapacityHold {
            id: Uuid::new_v4(),
            event_id,
            ticket_id,
            seats: 1,
            status: HoldStatus::Active,
            created_at: now,
            expires_at,
        };
        state.holds.insert(hold.id, hold.clone());
        Ok(ReserveOutcome::Granted(hold))
    }

    async fn confirm_hold(&self, hold_id: Uuid) -> RegistrationResult<HoldConfirmation> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let hold = state
            .holds
            .get_mut(&hold_id)
            .ok_or_else(|| RegistrationError::NotFound("Capacity hold".to_string()))?;

        match hold.status {
            HoldStatus::Confirmed => Ok(HoldConfirmation::AlreadyConfirmed),
            HoldStatus::Released | HoldStatus::Expired => Ok(HoldConfirmation::Lapsed),
            HoldStatus::Active => {
                hold.status = HoldStatus::Confirmed;
                let (event_id, ticket_id, seats) = (hold.event_id, hold.ticket_id, hold.seats);
                for usage in [
                    state.event_seats.entry(event_id).or_default(),
                    state.ticket_seats.entry(ticket_id).or_default(),
                ] {
                    usage.held = (usage.held - seats).max(0);
                    usage.confirmed += seats;
                }
                Ok(HoldConfirmation::Confirmed)
            }
        }
    }

    async fn release_hold(&self, hold_id: Uuid) -> RegistrationResult<bool> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let released = match state.holds.get_mut(&hold_id) {
            Some(hold) if hold.status == HoldStatus::Active => {
                hold.status = HoldStatus::Released;
                Some((hold.event_id, hold.ticket_id, hold.seats))
            }
            _ => None,
        };

        match released {
            Some((event_id, ticket_id, seats)) => {
                state.free_held_seat(event_id, ticket_id, seats);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn expire_holds(&self, now: DateTime<Utc>) -> RegistrationResult<u64> {
        Ok(self.state.lock().await.expire_where(now, |_| true))
    }

    async fn find_hold(&self, hold_id: Uuid) -> RegistrationResult<Option<CapacityHold>> {
        Ok(self.state.lock().await.holds.get(&hold_id).cloned())
    }
}

#[async_trait]
impl PaymentIntentStore for InMemoryStore {
    async fn find_live_by_key(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> RegistrationResult<Option<PaymentIntent>> {
        Ok(self
            .state
            .lock()
            .await
            .intents
            .values()
            .filter(|i| i.idempotency_key == key && i.status.is_live() && i.created_at >= since)
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn count_closed_by_key(&self, key: &str) -> RegistrationResult<u64> {
        Ok(self
            .state
            .lock()
            .await
            .intents
            .values()
            .filter(|i| {
                i.idempotency_key == key && i.status != PaymentIntentStatus::RequiresPayment
            })
            .count() as u64)
    }

    async fn insert_intent(&self, intent: PaymentIntent) -> RegistrationResult<IntentInsert> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.intents.get(&intent.id) {
            return Ok(IntentInsert::Existing(existing.clone()));
        }
        if let Some(existing) = state.intents.values().find(|i| {
            i.idempotency_key == intent.idempotency_key
                && i.status == PaymentIntentStatus::RequiresPayment
        }) {
            return Ok(IntentInsert::Existing(existing.clone()));
        }

        state.intents.insert(intent.id.clone(), intent.clone());
        Ok(IntentInsert::Inserted(intent))
    }

    async fn find_intent(&self, intent_id: &str) -> RegistrationResult<Option<PaymentIntent>> {
        Ok(self.state.lock().await.intents.get(intent_id).cloned())
    }

    async fn transition_intent(
        &self,
        intent_id: &str,
        status: PaymentIntentStatus,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<PaymentIntent>> {
        if !status.is_terminal() {
            return Err(RegistrationError::InvalidTransition(format!(
                "payment intent cannot move to {}",
                status
            )));
        }

        let mut state = self.state.lock().await;
        match state.intents.get_mut(intent_id) {
            Some(intent) if intent.status == PaymentIntentStatus::RequiresPayment => {
                intent.status = status;
                intent.updated_at = at;
                Ok(Some(intent.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update_intent_hold(
        &self,
        intent_id: &str,
        hold_id: Uuid,
        at: DateTime<Utc>,
    ) -> RegistrationResult<()> {
        let mut state = self.state.lock().await;
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| RegistrationError::NotFound("Payment intent".to_string()))?;
        intent.hold_id = hold_id;
        intent.updated_at = at;
        Ok(())
    }

    async fn list_stale_intents(
        &self,
        created_before: DateTime<Utc>,
    ) -> RegistrationResult<Vec<PaymentIntent>> {
        Ok(self
            .state
            .lock()
            .await
            .intents
            .values()
            .filter(|i| {
                i.status == PaymentIntentStatus::RequiresPayment && i.created_at < created_before
            })
            .cloned()
            .collect())
    }

    async fn list_unregistered_succeeded(&self) -> RegistrationResult<Vec<PaymentIntent>> {
        let state = self.state.lock().await;
        Ok(state
            .intents
            .values()
            .filter(|i| {
                i.status == PaymentIntentStatus::Succeeded
                    && !state.registration_by_intent.contains_key(&i.id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> RegistrationResult<RegistrationInsert> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .registration_by_intent
            .get(&registration.payment_intent_id)
            .and_then(|id| state.registrations.get(id))
        {
            return Ok(RegistrationInsert::Existing(existing.clone()));
        }
        if state
            .registration_by_token
            .contains_key(&registration.qr_code_token)
        {
            return Err(RegistrationError::Store(
                "check-in token collision".to_string(),
            ));
        }

        state
            .registration_by_intent
            .insert(registration.payment_intent_id.clone(), registration.id);
        state
            .registration_by_token
            .insert(registration.qr_code_token.clone(), registration.id);
        state
            .registrations
            .insert(registration.id, registration.clone());
        Ok(RegistrationInsert::Created(registration))
    }

    async fn find_registration(&self, id: Uuid) -> RegistrationResult<Option<Registration>> {
        Ok(self.state.lock().await.registrations.get(&id).cloned())
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> RegistrationResult<Option<Registration>> {
        let state = self.state.lock().await;
        Ok(state
            .registration_by_intent
            .get(payment_intent_id)
            .and_then(|id| state.registrations.get(id))
            .cloned())
    }

    async fn find_by_token(&self, token: &str) -> RegistrationResult<Option<Registration>> {
        let state = self.state.lock().await;
        Ok(state
            .registration_by_token
            .get(token)
            .and_then(|id| state.registrations.get(id))
            .cloned())
    }

    async fn set_approval(
        &self,
        id: Uuid,
        decision: &ApprovalDecision,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<Registration>> {
        let mut state = self.state.lock().await;
        match state.registrations.get_mut(&id) {
            Some(registration) if registration.approval_status == ApprovalStatus::Pending => {
                match decision {
                    ApprovalDecision::Approve => {
                        registration.approval_status = ApprovalStatus::Approved;
                        registration.approved_at = Some(at);
                    }
                    ApprovalDecision::Reject { reason } => {
                        registration.approval_status = ApprovalStatus::Rejected;
                        registration.rejection_reason = Some(reason.clone());
                    }
                }
                Ok(Some(registration.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn attach_document(
        &self,
        id: Uuid,
        document: &DocumentReference,
    ) -> RegistrationResult<Option<Registration>> {
        let mut state = self.state.lock().await;
        match state.registrations.get_mut(&id) {
            Some(registration) if registration.approval_status == ApprovalStatus::Pending => {
                registration.document_type = Some(document.document_type);
                registration.document_url = Some(document.document_url.clone());
                Ok(Some(registration.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn check_in(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<Registration>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(id) = state.registration_by_token.get(token).copied() else {
            return Ok(None);
        };
        let updated = match state.registrations.get_mut(&id) {
            Some(registration) if !registration.checked_in && registration.can_check_in() => {
                registration.checked_in = true;
                registration.checked_in_at = Some(at);
                registration.clone()
            }
            _ => return Ok(None),
        };

        state
            .checkin_counters
            .entry(updated.event_id)
            .or_insert_with(|| EventCheckinCounter {
                event_id: updated.event_id,
                checked_in: 0,
                reconciled_at: None,
            })
            .checked_in += 1;

        Ok(Some(updated))
    }

    async fn list_for_event(&self, event_id: Uuid) -> RegistrationResult<Vec<Registration>> {
        let mut registrations: Vec<Registration> = self
            .state
            .lock()
            .await
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        registrations.sort_by_key(|r| (r.created_at, r.id));
        Ok(registrations)
    }

    async fn checkin_stats(&self, event_id: Uuid) -> RegistrationResult<CheckinStats> {
        let state = self.state.lock().await;
        let (total, checked_in) = state
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .fold((0i64, 0i64), |(total, checked), r| {
                (total + 1, checked + i64::from(r.checked_in))
            });
        Ok(CheckinStats::new(total, checked_in))
    }

    async fn find_checkin_counter(
        &self,
        event_id: Uuid,
    ) -> RegistrationResult<Option<EventCheckinCounter>> {
        Ok(self
            .state
            .lock()
            .await
            .checkin_counters
            .get(&event_id)
            .cloned())
    }

    async fn reconcile_checkin_counters(
        &self,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Vec<CounterDrift>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let mut actual: HashMap<Uuid, i64> = state
            .checkin_counters
            .keys()
            .map(|event_id| (*event_id, 0))
            .collect();
        for registration in state.registrations.values() {
            let count = actual.entry(registration.event_id).or_insert(0);
            if registration.checked_in {
                *count += 1;
            }
        }

        let mut drifts = Vec::new();
        for (event_id, actual) in actual {
            let counter = state
                .checkin_counters
                .entry(event_id)
                .or_insert_with(|| EventCheckinCounter {
                    event_id,
                    checked_in: 0,
                    reconciled_at: None,
                });
            if counter.checked_in != actual {
                drifts.push(CounterDrift {
                    event_id,
                    cached: counter.checked_in,
                    actual,
                });
            }
            counter.checked_in = actual;
            counter.reconciled_at = Some(at);
        }
        drifts.sort_by_key(|d| d.event_id);
        Ok(drifts)
    }
}
