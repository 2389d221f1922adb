//! Capacity hold entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{CapacityHold, HoldStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for hold_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "hold_status", rename_all = "lowercase")]
pub enum HoldStatusDb {
    Active,
    Confirmed,
    Released,
    Expired,
}

impl From<HoldStatusDb> for HoldStatus {
    fn from(db: HoldStatusDb) -> Self {
        match db {
            HoldStatusDb::Active => HoldStatus::Active,
            HoldStatusDb::Confirmed => HoldStatus::Confirmed,
            HoldStatusDb::Released => HoldStatus::Released,
            HoldStatusDb::Expired => HoldStatus::Expired,
        }
    }
}

/// Database row mapping for the capacity_holds table.
#[derive(Debug, Clone, FromRow)]
pub struct CapacityHoldEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub seats: i32,
    pub status: HoldStatusDb,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<CapacityHoldEntity> for CapacityHold {
    fn from(entity: CapacityHoldEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            ticket_id: entity.ticket_id,
            seats: entity.seats,
            status: entity.status.into(),
            created_at: entity.created_at,
            expires_at: entity.expires_at,
        }
    }
}

/// Seat columns touched by a hold transition.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct HoldSeatsEntity {
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub seats: i32,
}
