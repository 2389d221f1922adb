//! Domain error taxonomy.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{ApprovalStatus, DocumentType, PaymentIntentStatus, Registration};

/// Errors produced by the registration core.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("No seats left for ticket {ticket_id} of event {event_id}")]
    CapacityExceeded { event_id: Uuid, ticket_id: Uuid },

    #[error("Event {0} is not on sale")]
    EventNotOnSale(Uuid),

    #[error("Payment intent creation failed: {0}")]
    PaymentIntentCreationFailed(String),

    #[error("Webhook signature invalid: {0}")]
    WebhookSignatureInvalid(String),

    #[error("Invalid or unknown check-in token")]
    InvalidOrUnknownToken,

    #[error("Registration {registration_id} is not approved (status: {approval_status})")]
    NotApproved {
        registration_id: Uuid,
        approval_status: ApprovalStatus,
    },

    #[error("Document type {document_type} is not accepted for ticket {ticket_id}")]
    UnsupportedDocumentType {
        document_type: DocumentType,
        ticket_id: Uuid,
    },

    #[error("A registration already exists for this payment")]
    DuplicateRegistrationAttempt(Box<Registration>),

    #[error("Payment intent {intent_id} is not confirmed (status: {status})")]
    PaymentNotConfirmed {
        intent_id: String,
        status: PaymentIntentStatus,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(String),
}

pub type RegistrationResult<T> = Result<T, RegistrationError>;
