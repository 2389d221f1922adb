//! Time-windowed discount tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A percentage discount applied to every ticket of an event while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    /// Whole percent, 0 to 100.
    pub discount_percentage: i32,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    pub display_order: i32,
}

impl PriceTier {
    /// Whether `now` falls inside the tier window. Missing bounds are open.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let after_start = self.available_from.map_or(true, |from| from <= now);
        let before_end = self.available_until.map_or(true, |until| now <= until);
        after_start && before_end
    }
}
