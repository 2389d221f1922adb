//! Payment intent domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::ticket::DocumentType;

/// Status of a payment intent as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPayment,
    Succeeded,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPayment => "requires_payment",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Failed => "failed",
            PaymentIntentStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentIntentStatus::RequiresPayment)
    }

    /// Statuses an idempotent create may reuse.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::RequiresPayment | PaymentIntentStatus::Succeeded
        )
    }
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentIntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requires_payment" => Ok(PaymentIntentStatus::RequiresPayment),
            "succeeded" => Ok(PaymentIntentStatus::Succeeded),
            "failed" => Ok(PaymentIntentStatus::Failed),
            "cancelled" | "canceled" => Ok(PaymentIntentStatus::Cancelled),
            other => Err(format!("unknown payment intent status '{}'", other)),
        }
    }
}

/// Optional add-on purchased with a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Upsell {
    #[validate(length(min = 1, max = 100, message = "Upsell id must be between 1 and 100 characters"))]
    pub id: String,

    #[validate(custom(function = "shared::validation::validate_amount_cents"))]
    pub price_cents: i64,
}

/// A supporting document stored by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    pub document_type: DocumentType,

    #[validate(custom(function = "shared::validation::validate_document_url"))]
    pub document_url: String,
}

/// A payment intent opened with the processor for one hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// The processor's external intent id.
    pub id: String,
    pub idempotency_key: String,
    pub user_id: String,
    pub email: String,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub hold_id: Uuid,
    pub upsells: Vec<Upsell>,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub status: PaymentIntentStatus,
    pub document: Option<DocumentReference>,
    pub price_tier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// The fact handed to the ledger once this intent has succeeded.
    pub fn confirmation(&self) -> PaymentConfirmed {
        PaymentConfirmed {
            payment_intent_id: self.id.clone(),
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            event_id: self.event_id,
            ticket_id: self.ticket_id,
            upsells: self.upsells.clone(),
            amount_cents: self.amount_cents,
            currency: self.currency.clone(),
            document: self.document.clone(),
        }
    }
}

/// Emitted when the processor reports a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmed {
    pub payment_intent_id: String,
    pub user_id: String,
    pub email: String,
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub upsells: Vec<Upsell>,
    pub amount_cents: i64,
    pub currency: String,
    pub document: Option<DocumentReference>,
}

/// Request payload for opening a payment intent.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    #[validate(length(min = 1, max = 255, message = "User id must be between 1 and 255 characters"))]
    pub user_id: String,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,

    pub event_id: Uuid,

    pub ticket_id: Uuid,

    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 upsells per purchase"), nested)]
    pub upsells: Vec<Upsell>,

    #[validate(nested)]
    pub document: Option<DocumentReference>,
}

/// Response payload for a created or reused payment intent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub reused: bool,
}

/// Webhook body posted by the payment processor.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: ProcessorWebhookData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorWebhookData {
    pub intent_id: String,
    pub status: PaymentIntentStatus,
}

/// Response returned to the processor after a webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!PaymentIntentStatus::RequiresPayment.is_terminal());
        assert!(PaymentIntentStatus::Succeeded.is_terminal());
        assert!(PaymentIntentStatus::Failed.is_terminal());
        assert!(PaymentIntentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_live_statuses() {
        assert!(PaymentIntentStatus::RequiresPayment.is_live());
        assert!(PaymentIntentStatus::Succeeded.is_live());
        assert!(!PaymentIntentStatus::Failed.is_live());
        assert!(!PaymentIntentStatus::Cancelled.is_live());
    }

    #[test]
    fn test_status_parse_accepts_american_spelling() {
        assert_eq!(
            "canceled".parse::<PaymentIntentStatus>().unwrap(),
            PaymentIntentStatus::Cancelled
        );
        assert!("processing".parse::<PaymentIntentStatus>().is_err());
    }

    #[test]
    fn test_webhook_event_deserialization() {
        let event: ProcessorWebhookEvent = serde_json::from_str(
            r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"intentId":"pi_1","status":"succeeded"}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.intent_id, "pi_1");
        assert_eq!(event.data.status, PaymentIntentStatus::Succeeded);
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreatePaymentIntentRequest {
            user_id: "user-1".to_string(),
            email: "runner@example.com".to_string(),
            event_id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            upsells: vec![Upsell {
                id: "tshirt".to_string(),
                price_cents: -5,
            }],
            document: None,
        };
        assert!(request.validate().is_err());

        let request = CreatePaymentIntentRequest {
            upsells: vec![Upsell {
                id: "tshirt".to_string(),
                price_cents: 1_500,
            }],
            ..request
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_bounds_upsells() {
        let upsell = |price_cents| Upsell {
            id: "medal".to_string(),
            price_cents,
        };
        let request = CreatePaymentIntentRequest {
            user_id: "user-1".to_string(),
            email: "runner@example.com".to_string(),
            event_id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            upsells: vec![upsell(i64::MAX), upsell(1)],
            document: None,
        };
        assert!(request.validate().is_err());

        let request = CreatePaymentIntentRequest {
            upsells: vec![upsell(100); 21],
            ..request
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_client_secret_not_serialized() {
        let now = Utc::now();
        let intent = PaymentIntent {
            id: "pi_1".to_string(),
            idempotency_key: "k".to_string(),
            user_id: "user-1".to_string(),
            email: "runner@example.com".to_string(),
            event_id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            hold_id: Uuid::new_v4(),
            upsells: vec![],
            amount_cents: 5_000,
            currency: "eur".to_string(),
            client_secret: "pi_1_secret_abc".to_string(),
            status: PaymentIntentStatus::RequiresPayment,
            document: None,
            price_tier_id: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert!(!json.contains("secret_abc"));
        assert_eq!(intent.confirmation().payment_intent_id, "pi_1");
    }
}
