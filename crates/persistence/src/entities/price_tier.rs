//! Price tier entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::PriceTier;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the price_tiers table.
#[derive(Debug, Clone, FromRow)]
pub struct PriceTierEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub discount_percentage: i32,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<PriceTierEntity> for PriceTier {
    fn from(entity: PriceTierEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            name: entity.name,
            discount_percentage: entity.discount_percentage,
            available_from: entity.available_from,
            available_until: entity.available_until,
            display_order: entity.display_order,
        }
    }
}
