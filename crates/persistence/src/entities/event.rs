//! Event entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Event, EventStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for event_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
pub enum EventStatusDb {
    Draft,
    OnSale,
    SoldOut,
    Closed,
    Cancelled,
    Completed,
}

impl From<EventStatusDb> for EventStatus {
    fn from(db: EventStatusDb) -> Self {
        match db {
            EventStatusDb::Draft => EventStatus::Draft,
            EventStatusDb::OnSale => EventStatus::OnSale,
            EventStatusDb::SoldOut => EventStatus::SoldOut,
            EventStatusDb::Closed => EventStatus::Closed,
            EventStatusDb::Cancelled => EventStatus::Cancelled,
            EventStatusDb::Completed => EventStatus::Completed,
        }
    }
}

impl From<EventStatus> for EventStatusDb {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Draft => EventStatusDb::Draft,
            EventStatus::OnSale => EventStatusDb::OnSale,
            EventStatus::SoldOut => EventStatusDb::SoldOut,
            EventStatus::Closed => EventStatusDb::Closed,
            EventStatus::Cancelled => EventStatusDb::Cancelled,
            EventStatus::Completed => EventStatusDb::Completed,
        }
    }
}

/// Database row mapping for the events table.
#[derive(Debug, Clone, FromRow)]
pub struct EventEntity {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub status: EventStatusDb,
    pub starts_at: Option<DateTime<Utc>>,
    pub seats_held: i32,
    pub seats_confirmed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventEntity> for Event {
    fn from(entity: EventEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            capacity: entity.capacity,
            status: entity.status.into(),
            starts_at: entity.starts_at,
            created_at: entity.created_at,
        }
    }
}
