//! Race event domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sales lifecycle of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    OnSale,
    SoldOut,
    Closed,
    Cancelled,
    Completed,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Draft => write!(f, "draft"),
            EventStatus::OnSale => write!(f, "on_sale"),
            EventStatus::SoldOut => write!(f, "sold_out"),
            EventStatus::Closed => write!(f, "closed"),
            EventStatus::Cancelled => write!(f, "cancelled"),
            EventStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A capacity-limited race event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    /// Maximum number of non-cancelled registrations across all tickets.
    pub capacity: i32,
    pub status: EventStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Whether new seats may be reserved for this event.
    pub fn is_on_sale(&self) -> bool {
        self.status == EventStatus::OnSale
    }
}
