//! Capacity allocation.
//!
//! Grants short-lived seat holds without ever letting held plus confirmed
//! seats exceed either the ticket limit or the event capacity.

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use uuid::Uuid;

use crate::errors::{RegistrationError, RegistrationResult};
use crate::models::{CapacityHold, HoldConfirmation, ReserveOutcome};
use crate::store::CapacityStore;

/// Default hold time-to-live.
pub const DEFAULT_HOLD_TTL_SECS: i64 = 600;

/// Owns seat holds and seat counters.
#[derive(Clone)]
pub struct CapacityAllocator {
    store: Arc<dyn CapacityStore>,
    hold_ttl: Duration,
}

impl CapacityAllocator {
    pub fn new(store: Arc<dyn CapacityStore>, hold_ttl_secs: i64) -> Self {
        Self {
            store,
            hold_ttl: Duration::seconds(hold_ttl_secs),
        }
    }

    pub fn hold_ttl(&self) -> Duration {
        self.hold_ttl
    }

    /// Reserves one seat for `ticket_id`.
    pub async fn reserve(&self, event_id: Uuid, ticket_id: Uuid) -> RegistrationResult<CapacityHold> {
        let now = Utc::now();
        let outcome = self
            .store
            .try_reserve(event_id, ticket_id, now, now + self.hold_ttl)
            .await?;

        match outcome {
            ReserveOutcome::Granted(hold) => {
                counter!("holds_granted_total").increment(1);
                tracing::debug!(
                    hold_id = %hold.id,
                    event_id = %event_id,
                    ticket_id = %ticket_id,
                    expires_at = %hold.expires_at,
                    "Capacity hold granted"
                );
                Ok(hold)
            }
            ReserveOutcome::Exhausted => {
                counter!("holds_denied_total", "reason" => "capacity").increment(1);
                tracing::info!(
                    event_id = %event_id,
                    ticket_id = %ticket_id,
                    "Capacity exhausted"
                );
                Err(RegistrationError::CapacityExceeded {
                    event_id,
                    ticket_id,
                })
            }
            ReserveOutcome::EventNotOnSale => {
                counter!("holds_denied_total", "reason" => "not_on_sale").increment(1);
                Err(RegistrationError::EventNotOnSale(event_id))
            }
            ReserveOutcome::NotFound => Err(RegistrationError::NotFound("Ticket".to_string())),
        }
    }

    /// Converts a hold into a permanent seat. Idempotent.
    pub async fn confirm(&self, hold_id: Uuid) -> RegistrationResult<HoldConfirmation> {
        let confirmation = self.store.confirm_hold(hold_id).await?;
        if confirmation == HoldConfirmation::Lapsed {
            tracing::warn!(hold_id = %hold_id, "Hold lapsed before confirmation");
        }
        Ok(confirmation)
    }

    /// Frees an active hold. No-op for holds that are not active.
    pub async fn release(&self, hold_id: Uuid) -> RegistrationResult<bool> {
        let released = self.store.release_hold(hold_id).await?;
        if released {
            tracing::debug!(hold_id = %hold_id, "Capacity hold released");
        }
        Ok(released)
    }

    /// Expires every active hold past its deadline.
    pub async fn sweep_expired(&self) -> RegistrationResult<u64> {
        let expired = self.store.expire_holds(Utc::now()).await?;
        if expired > 0 {
            counter!("holds_expired_total").increment(expired);
            tracing::info!(expired = expired, "Expired stale capacity holds");
        }
        Ok(expired)
    }
}
