//! Registration entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{ApprovalStatus, Registration, Upsell};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::DocumentTypeDb;

/// Database enum for approval_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "lowercase")]
pub enum ApprovalStatusDb {
    Pending,
    Approved,
    Rejected,
}

impl From<ApprovalStatusDb> for ApprovalStatus {
    fn from(db: ApprovalStatusDb) -> Self {
        match db {
            ApprovalStatusDb::Pending => ApprovalStatus::Pending,
            ApprovalStatusDb::Approved => ApprovalStatus::Approved,
            ApprovalStatusDb::Rejected => ApprovalStatus::Rejected,
        }
    }
}

impl From<ApprovalStatus> for ApprovalStatusDb {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => ApprovalStatusDb::Pending,
            ApprovalStatus::Approved => ApprovalStatusDb::Approved,
            ApprovalStatus::Rejected => ApprovalStatusDb::Rejected,
        }
    }
}

/// Database row mapping for the registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: String,
    pub email: String,
    pub payment_intent_id: String,
    pub upsells: Json<Vec<Upsell>>,
    pub amount_cents: i64,
    pub currency: String,
    pub document_required: bool,
    pub approval_status: ApprovalStatusDb,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub qr_code_token: String,
    pub document_type: Option<DocumentTypeDb>,
    pub document_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl From<RegistrationEntity> for Registration {
    fn from(entity: RegistrationEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            ticket_id: entity.ticket_id,
            user_id: entity.user_id,
            email: entity.email,
            payment_intent_id: entity.payment_intent_id,
            upsells: entity.upsells.0,
            amount_cents: entity.amount_cents,
            currency: entity.currency,
            document_required: entity.document_required,
            approval_status: entity.approval_status.into(),
            checked_in: entity.checked_in,
            checked_in_at: entity.checked_in_at,
            qr_code_token: entity.qr_code_token,
            document_type: entity.document_type.map(Into::into),
            document_url: entity.document_url,
            created_at: entity.created_at,
            approved_at: entity.approved_at,
            rejection_reason: entity.rejection_reason,
        }
    }
}
