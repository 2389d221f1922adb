//! Capacity hold domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a seat hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Confirmed,
    Released,
    Expired,
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldStatus::Active => write!(f, "active"),
            HoldStatus::Confirmed => write!(f, "confirmed"),
            HoldStatus::Released => write!(f, "released"),
            HoldStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A short-lived reservation of one seat pending payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityHold {
    pub id: Uuid,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub seats: i32,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CapacityHold {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Active && self.expires_at < now
    }
}

/// Result of an atomic reservation attempt against the store.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    Granted(CapacityHold),
    /// Either the ticket limit or the event capacity is exhausted.
    Exhausted,
    EventNotOnSale,
    NotFound,
}

/// Result of converting a hold into a permanent seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldConfirmation {
    Confirmed,
    AlreadyConfirmed,
    /// The hold was released or expired before confirmation arrived.
    Lapsed,
}

/// Seat counters for one ticket or event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatUsage {
    pub held: i32,
    pub confirmed: i32,
}

impl SeatUsage {
    pub fn in_use(&self) -> i32 {
        self.held + self.confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_hold_status_display() {
        assert_eq!(HoldStatus::Active.to_string(), "active");
        assert_eq!(HoldStatus::Confirmed.to_string(), "confirmed");
        assert_eq!(HoldStatus::Released.to_string(), "released");
        assert_eq!(HoldStatus::Expired.to_string(), "expired");
    }

    #[test]
    fn test_only_active_holds_expire() {
        let now = Utc::now();
        let mut hold = CapacityHold {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            seats: 1,
            status: HoldStatus::Active,
            created_at: now - Duration::minutes(20),
            expires_at: now - Duration::minutes(10),
        };
        assert!(hold.is_expired_at(now));
        hold.status = HoldStatus::Confirmed;
        assert!(!hold.is_expired_at(now));
    }

    #[test]
    fn test_seat_usage_in_use() {
        let usage = SeatUsage {
            held: 2,
            confirmed: 5,
        };
        assert_eq!(usage.in_use(), 7);
    }
}
