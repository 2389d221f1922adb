//! Registration domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::payment_intent::{DocumentReference, Upsell};
use super::ticket::DocumentType;

/// Review status of a registration's supporting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Lifecycle position of a registration row.
///
/// `AwaitingPayment`, `PaymentFailed` and `Cancelled` have no row: they are
/// represented by a hold plus a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Paid,
    DocumentPending,
    Approved,
    Rejected,
    CheckedIn,
}

/// A paid participation in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: String,
    pub email: String,
    pub payment_intent_id: String,
    pub upsells: Vec<Upsell>,
    pub amount_cents: i64,
    pub currency: String,
    pub document_required: bool,
    pub approval_status: ApprovalStatus,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub qr_code_token: String,
    pub document_type: Option<DocumentType>,
    pub document_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl Registration {
    /// Whether the holder may pass the check-in gate.
    pub fn can_check_in(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved || !self.document_required
    }

    pub fn state(&self) -> RegistrationState {
        if self.checked_in {
            return RegistrationState::CheckedIn;
        }
        match (self.approval_status, self.document_required) {
            (ApprovalStatus::Rejected, _) => RegistrationState::Rejected,
            (ApprovalStatus::Pending, _) => RegistrationState::DocumentPending,
            (ApprovalStatus::Approved, true) => RegistrationState::Approved,
            (ApprovalStatus::Approved, false) => RegistrationState::Paid,
        }
    }
}

/// Outcome of an idempotent registration insert.
#[derive(Debug, Clone)]
pub enum RegistrationInsert {
    Created(Registration),
    Existing(Registration),
}

impl RegistrationInsert {
    pub fn registration(&self) -> &Registration {
        match self {
            RegistrationInsert::Created(r) | RegistrationInsert::Existing(r) => r,
        }
    }

    pub fn into_registration(self) -> Registration {
        match self {
            RegistrationInsert::Created(r) | RegistrationInsert::Existing(r) => r,
        }
    }
}

/// A reviewer's verdict on a pending registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject { reason: String },
}

/// Request payload for `POST /registrations`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistrationRequest {
    #[validate(length(min = 1, max = 255, message = "Payment intent id is required"))]
    pub payment_intent_id: String,

    pub ticket_id: Uuid,

    pub event_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "User id must be between 1 and 255 characters"))]
    pub user_id: String,

    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 upsells per purchase"), nested)]
    pub upsells: Vec<Upsell>,

    #[validate(nested)]
    pub document_ref: Option<DocumentReference>,
}

/// Request payload for attaching a document to a registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    pub document_type: DocumentType,

    #[validate(custom(function = "shared::validation::validate_document_url"))]
    pub document_url: String,
}

/// Request payload for an approval decision.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,

    #[validate(length(max = 1000, message = "Reason must be at most 1000 characters"))]
    pub reason: Option<String>,
}

impl ApprovalRequest {
    /// Converts the payload into a decision, rejecting `pending` and
    /// reasonless rejections.
    pub fn into_decision(self) -> Result<ApprovalDecision, String> {
        match self.status {
            ApprovalStatus::Approved => Ok(ApprovalDecision::Approve),
            ApprovalStatus::Rejected => match self.reason {
                Some(reason) if !reason.trim().is_empty() => Ok(ApprovalDecision::Reject {
                    reason: reason.trim().to_string(),
                }),
                _ => Err("A rejection reason is required".to_string()),
            },
            ApprovalStatus::Pending => {
                Err("Approval status must be 'approved' or 'rejected'".to_string())
            }
        }
    }
}
