//! Event check-in counter entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{CounterDrift, EventCheckinCounter};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the event_checkin_counters table.
#[derive(Debug, Clone, FromRow)]
pub struct CheckinCounterEntity {
    pub event_id: Uuid,
    pub checked_in: i64,
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl From<CheckinCounterEntity> for EventCheckinCounter {
    fn from(entity: CheckinCounterEntity) -> Self {
        Self {
            event_id: entity.event_id,
            checked_in: entity.checked_in,
            reconciled_at: entity.reconciled_at,
        }
    }
}

/// Row produced by the counter reconciliation query.
#[derive(Debug, Clone, FromRow)]
pub struct CounterDriftEntity {
    pub event_id: Uuid,
    pub cached: i64,
    pub actual: i64,
}

impl From<CounterDriftEntity> for CounterDrift {
    fn from(entity: CounterDriftEntity) -> Self {
        Self {
            event_id: entity.event_id,
            cached: entity.cached,
            actual: entity.actual,
        }
    }
}

/// Aggregate row for per-event check-in statistics.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct CheckinStatsEntity {
    pub total: i64,
    pub checked_in: i64,
}
