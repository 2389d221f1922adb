//! Ticket entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{DocumentType, Ticket};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for document_type that maps to PostgreSQL enum type.
/// The derive also provides the `document_type[]` array mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
pub enum DocumentTypeDb {
    MedicalCertificate,
    FederationLicense,
    IdentityDocument,
    ParentalAuthorization,
}

impl sqlx::postgres::PgHasArrayType for DocumentTypeDb {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_document_type")
    }
}

impl From<DocumentTypeDb> for DocumentType {
    fn from(db: DocumentTypeDb) -> Self {
        match db {
            DocumentTypeDb::MedicalCertificate => DocumentType::MedicalCertificate,
            DocumentTypeDb::FederationLicense => DocumentType::FederationLicense,
            DocumentTypeDb::IdentityDocument => DocumentType::IdentityDocument,
            DocumentTypeDb::ParentalAuthorization => DocumentType::ParentalAuthorization,
        }
    }
}

impl From<DocumentType> for DocumentTypeDb {
    fn from(document_type: DocumentType) -> Self {
        match document_type {
            DocumentType::MedicalCertificate => DocumentTypeDb::MedicalCertificate,
            DocumentType::FederationLicense => DocumentTypeDb::FederationLicense,
            DocumentType::IdentityDocument => DocumentTypeDb::IdentityDocument,
            DocumentType::ParentalAuthorization => DocumentTypeDb::ParentalAuthorization,
        }
    }
}

/// Database row mapping for the tickets table.
#[derive(Debug, Clone, FromRow)]
pub struct TicketEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub base_price_cents: i64,
    pub currency: String,
    pub max_participants: i32,
    pub requires_document: bool,
    pub document_types: Vec<DocumentTypeDb>,
    pub seats_held: i32,
    pub seats_confirmed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TicketEntity> for Ticket {
    fn from(entity: TicketEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            name: entity.name,
            base_price_cents: entity.base_price_cents,
            currency: entity.currency,
            max_participants: entity.max_participants,
            requires_document: entity.requires_document,
            document_types: entity.document_types.into_iter().map(Into::into).collect(),
        }
    }
}
