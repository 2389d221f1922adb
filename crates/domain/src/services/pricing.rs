//! Price tier resolution.
//!
//! Picks the active discount tier for an event at a given instant and
//! computes effective ticket prices. Everything here is pure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{RegistrationError, RegistrationResult};
use crate::models::{PriceTier, Ticket, Upsell};

/// Priced breakdown of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub ticket_price_cents: i64,
    pub upsells_total_cents: i64,
    pub total_cents: i64,
    pub tier_id: Option<Uuid>,
}

/// Returns the tier active at `now`.
///
/// Overlapping windows resolve to the lowest `display_order`, then the
/// smallest id.
pub fn resolve(tiers: &[PriceTier], now: DateTime<Utc>) -> Option<&PriceTier> {
    tiers
        .iter()
        .filter(|tier| tier.is_active_at(now))
        .min_by_key(|tier| (tier.display_order, tier.id))
}

/// Applies a tier discount with half-up rounding to the nearest cent.
pub fn compute_price(base_price_cents: i64, tier: Option<&PriceTier>) -> i64 {
    match tier {
        None => base_price_cents,
        Some(tier) => {
            let keep = i64::from(100 - tier.discount_percentage.clamp(0, 100));
            (base_price_cents * keep + 50).div_euclid(100)
        }
    }
}

/// Prices a ticket plus upsells at `now`. Totals that do not fit in an
/// `i64` are a validation error.
pub fn quote(
    ticket: &Ticket,
    tiers: &[PriceTier],
    upsells: &[Upsell],
    now: DateTime<Utc>,
) -> RegistrationResult<PriceQuote> {
    let tier = resolve(tiers, now);
    let ticket_price_cents = compute_price(ticket.base_price_cents, tier);
    let upsells_total_cents = upsells
        .iter()
        .try_fold(0i64, |total, upsell| total.checked_add(upsell.price_cents))
        .ok_or_else(overflow)?;
    let total_cents = ticket_price_cents
        .checked_add(upsells_total_cents)
        .ok_or_else(overflow)?;

    Ok(PriceQuote {
        ticket_price_cents,
        upsells_total_cents,
        total_cents,
        tier_id: tier.map(|t| t.id),
    })
}

fn overflow() -> RegistrationError {
    RegistrationError::Validation("Purchase total is out of range".to_string())
}
