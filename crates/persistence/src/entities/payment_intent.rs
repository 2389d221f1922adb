//! Payment intent entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{DocumentReference, PaymentIntent, PaymentIntentStatus, Upsell};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::DocumentTypeDb;

/// Database enum for payment_intent_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_intent_status", rename_all = "snake_case")]
pub enum PaymentIntentStatusDb {
    RequiresPayment,
    Succeeded,
    Failed,
    Cancelled,
}

impl From<PaymentIntentStatusDb> for PaymentIntentStatus {
    fn from(db: PaymentIntentStatusDb) -> Self {
        match db {
            PaymentIntentStatusDb::RequiresPayment => PaymentIntentStatus::RequiresPayment,
            PaymentIntentStatusDb::Succeeded => PaymentIntentStatus::Succeeded,
            PaymentIntentStatusDb::Failed => PaymentIntentStatus::Failed,
            PaymentIntentStatusDb::Cancelled => PaymentIntentStatus::Cancelled,
        }
    }
}

impl From<PaymentIntentStatus> for PaymentIntentStatusDb {
    fn from(status: PaymentIntentStatus) -> Self {
        match status {
            PaymentIntentStatus::RequiresPayment => PaymentIntentStatusDb::RequiresPayment,
            PaymentIntentStatus::Succeeded => PaymentIntentStatusDb::Succeeded,
            PaymentIntentStatus::Failed => PaymentIntentStatusDb::Failed,
            PaymentIntentStatus::Cancelled => PaymentIntentStatusDb::Cancelled,
        }
    }
}

/// Database row mapping for the payment_intents table.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentIntentEntity {
    pub id: String,
    pub idempotency_key: String,
    pub user_id: String,
    pub email: String,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub hold_id: Uuid,
    pub upsells: Json<Vec<Upsell>>,
    pub amount_cents: i64,
    pub currency: String,
    pub client_secret: String,
    pub status: PaymentIntentStatusDb,
    pub document_type: Option<DocumentTypeDb>,
    pub document_url: Option<String>,
    pub price_tier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentIntentEntity> for PaymentIntent {
    fn from(entity: PaymentIntentEntity) -> Self {
        let document = match (entity.document_type, entity.document_url) {
            (Some(document_type), Some(document_url)) => Some(DocumentReference {
                document_type: document_type.into(),
                document_url,
            }),
            _ => None,
        };

        Self {
            id: entity.id,
            idempotency_key: entity.idempotency_key,
            user_id: entity.user_id,
            email: entity.email,
            event_id: entity.event_id,
            ticket_id: entity.ticket_id,
            hold_id: entity.hold_id,
            upsells: entity.upsells.0,
            amount_cents: entity.amount_cents,
            currency: entity.currency,
            client_secret: entity.client_secret,
            status: entity.status.into(),
            document,
            price_tier_id: entity.price_tier_id,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
