//! Document approval gate.
//!
//! Registrations for document-gated tickets stay `pending` until a reviewer
//! approves the uploaded document.

use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{RegistrationError, RegistrationResult};
use crate::models::{ApprovalDecision, DocumentReference, Registration, Ticket};
use crate::services::ledger::RegistrationLedger;
use crate::store::CatalogStore;

/// Checks a document reference against the ticket's accepted types.
pub fn validate_document(ticket: &Ticket, document: &DocumentReference) -> RegistrationResult<()> {
    if !ticket.accepts_document(document.document_type) {
        return Err(RegistrationError::UnsupportedDocumentType {
            document_type: document.document_type,
            ticket_id: ticket.id,
        });
    }
    shared::validation::validate_document_url(&document.document_url).map_err(|e| {
        RegistrationError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Invalid document URL".to_string()),
        )
    })
}

#[derive(Clone)]
pub struct DocumentApprovalGate {
    ledger: RegistrationLedger,
    catalog: Arc<dyn CatalogStore>,
}

impl DocumentApprovalGate {
    pub fn new(ledger: RegistrationLedger, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { ledger, catalog }
    }

    /// Attaches a document to a pending registration.
    pub async fn upload_document(
        &self,
        registration_id: Uuid,
        document: DocumentReference,
    ) -> RegistrationResult<Registration> {
        let registration = self.ledger.find(registration_id).await?;
        let ticket = self
            .catalog
            .find_ticket(registration.ticket_id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound("Ticket".to_string()))?;

        validate_document(&ticket, &document)?;

        let updated = self
            .ledger
            .attach_document(registration_id, &document)
            .await?;
        tracing::info!(
            registration_id = %registration_id,
            document_type = %document.document_type,
            "Document uploaded for review"
        );
        Ok(updated)
    }

    /// Applies a reviewer's decision.
    pub async fn review(
        &self,
        registration_id: Uuid,
        decision: ApprovalDecision,
    ) -> RegistrationResult<Registration> {
        match decision {
            ApprovalDecision::Approve => self.ledger.approve(registration_id).await,
            ApprovalDecision::Reject { reason } => {
                self.ledger.reject(registration_id, &reason).await
            }
        }
    }
}
