//! Check-in domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::registration::Registration;

/// Request payload for a scanned check-in token.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    #[validate(length(min = 1, max = 256, message = "Token must be between 1 and 256 characters"))]
    pub token: String,
}

/// Query parameters for the operator overview.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInQuery {
    pub event_id: Uuid,
}

/// Result of a successful scan.
#[derive(Debug, Clone)]
pub struct CheckInOutcome {
    pub registration: Registration,
    /// True when this scan found the registration already checked in.
    pub already_checked_in: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub registration: Registration,
    pub already_checked_in: bool,
    pub message: String,
}

impl From<CheckInOutcome> for CheckInResponse {
    fn from(outcome: CheckInOutcome) -> Self {
        let message = if outcome.already_checked_in {
            "Participant already checked in".to_string()
        } else {
            "Check-in successful".to_string()
        };
        Self {
            registration: outcome.registration,
            already_checked_in: outcome.already_checked_in,
            message,
        }
    }
}

/// Check-in statistics derived from the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinStats {
    pub total: i64,
    pub checked_in: i64,
    /// Registrations not yet checked in.
    pub pending: i64,
}

impl CheckinStats {
    pub fn new(total: i64, checked_in: i64) -> Self {
        Self {
            total,
            checked_in,
            pending: total - checked_in,
        }
    }
}

/// Operator view of an event's registrations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOverview {
    pub registrations: Vec<Registration>,
    pub stats: CheckinStats,
}

/// Cached per-event check-in count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCheckinCounter {
    pub event_id: Uuid,
    pub checked_in: i64,
    pub reconciled_at: Option<DateTime<Utc>>,
}

/// A counter found out of step with the ledger during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDrift {
    pub event_id: Uuid,
    pub cached: i64,
    pub actual: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_pending_is_not_checked_in() {
        let stats = CheckinStats::new(10, 4);
        assert_eq!(stats.pending, 6);
    }

    #[test]
    fn test_stats_serialization() {
        let json = serde_json::to_value(CheckinStats::new(3, 1)).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["checkedIn"], 1);
        assert_eq!(json["pending"], 2);
    }
}
