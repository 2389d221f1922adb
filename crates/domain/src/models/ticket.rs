//! Ticket domain model.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Supporting document kinds a ticket may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    MedicalCertificate,
    FederationLicense,
    IdentityDocument,
    ParentalAuthorization,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::MedicalCertificate => "medical_certificate",
            DocumentType::FederationLicense => "federation_license",
            DocumentType::IdentityDocument => "identity_document",
            DocumentType::ParentalAuthorization => "parental_authorization",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medical_certificate" => Ok(DocumentType::MedicalCertificate),
            "federation_license" => Ok(DocumentType::FederationLicense),
            "identity_document" => Ok(DocumentType::IdentityDocument),
            "parental_authorization" => Ok(DocumentType::ParentalAuthorization),
            other => Err(format!("unknown document type '{}'", other)),
        }
    }
}

/// A purchasable ticket belonging to exactly one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub base_price_cents: i64,
    pub currency: String,
    /// 0 means bounded only by the event capacity.
    pub max_participants: i32,
    pub requires_document: bool,
    pub document_types: Vec<DocumentType>,
}

impl Ticket {
    /// Whether the ticket has its own seat limit.
    pub fn has_own_limit(&self) -> bool {
        self.max_participants > 0
    }

    /// Whether a document of this type may be attached to a registration.
    pub fn accepts_document(&self, document_type: DocumentType) -> bool {
        self.document_types.contains(&document_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "Elite wave".to_string(),
            base_price_cents: 8_500,
            currency: "eur".to_string(),
            max_participants: 0,
            requires_document: true,
            document_types: vec![
                DocumentType::MedicalCertificate,
                DocumentType::FederationLicense,
            ],
        }
    }

    #[test]
    fn test_document_type_parse_and_display() {
        for kind in [
            DocumentType::MedicalCertificate,
            DocumentType::FederationLicense,
            DocumentType::IdentityDocument,
            DocumentType::ParentalAuthorization,
        ] {
            assert_eq!(kind.to_string().parse::<DocumentType>().unwrap(), kind);
        }
        assert!("passport".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_accepts_declared_document_types_only() {
        let ticket = ticket();
        assert!(ticket.accepts_document(DocumentType::MedicalCertificate));
        assert!(ticket.accepts_document(DocumentType::FederationLicense));
        assert!(!ticket.accepts_document(DocumentType::IdentityDocument));
    }

    #[test]
    fn test_zero_max_participants_means_unbounded() {
        let mut ticket = ticket();
        assert!(!ticket.has_own_limit());
        ticket.max_participants = 50;
        assert!(ticket.has_own_limit());
    }
}
