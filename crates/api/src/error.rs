use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::Registration;
use domain::RegistrationError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Event not on sale: {0}")]
    EventNotOnSale(String),

    #[error("Payment intent creation failed: {0}")]
    PaymentIntentCreationFailed(String),

    #[error("Webhook signature invalid: {0}")]
    WebhookSignatureInvalid(String),

    #[error("Unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    #[error("Duplicate registration")]
    DuplicateRegistration(Box<Registration>),

    #[error("Payment not confirmed: {0}")]
    PaymentNotConfirmed(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Not approved: {0}")]
    NotApproved(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registration: Option<Registration>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut registration = None;
        let (status, error_code, message) = match self {
            ApiError::CapacityExceeded(msg) => (StatusCode::CONFLICT, "capacity_exceeded", msg),
            ApiError::EventNotOnSale(msg) => (StatusCode::CONFLICT, "event_not_on_sale", msg),
            ApiError::PaymentIntentCreationFailed(msg) => {
                tracing::warn!("Payment intent creation failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "payment_intent_creation_failed",
                    "The payment provider could not open a payment".into(),
                )
            }
            ApiError::WebhookSignatureInvalid(_) => (
                StatusCode::UNAUTHORIZED,
                "webhook_signature_invalid",
                "Webhook signature verification failed".into(),
            ),
            ApiError::UnsupportedDocumentType(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unsupported_document_type",
                msg,
            ),
            ApiError::DuplicateRegistration(existing) => {
                registration = Some(*existing);
                (
                    StatusCode::CONFLICT,
                    "duplicate_registration",
                    "A registration already exists for this payment".into(),
                )
            }
            ApiError::PaymentNotConfirmed(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "payment_not_confirmed", msg)
            }
            ApiError::InvalidTransition(msg) => (StatusCode::CONFLICT, "invalid_transition", msg),
            ApiError::InvalidToken => (
                StatusCode::NOT_FOUND,
                "invalid_token",
                "Invalid or unknown check-in token".into(),
            ),
            ApiError::NotApproved(msg) => (StatusCode::FORBIDDEN, "not_approved", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details: None,
            registration,
        };

        (status, Json(body)).into_response()
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            e @ RegistrationError::CapacityExceeded { .. } => {
                ApiError::CapacityExceeded(e.to_string())
            }
            e @ RegistrationError::EventNotOnSale(_) => ApiError::EventNotOnSale(e.to_string()),
            RegistrationError::PaymentIntentCreationFailed(msg) => {
                ApiError::PaymentIntentCreationFailed(msg)
            }
            RegistrationError::WebhookSignatureInvalid(reason) => {
                ApiError::WebhookSignatureInvalid(reason)
            }
            RegistrationError::InvalidOrUnknownToken => ApiError::InvalidToken,
            e @ RegistrationError::NotApproved { .. } => ApiError::NotApproved(e.to_string()),
            e @ RegistrationError::UnsupportedDocumentType { .. } => {
                ApiError::UnsupportedDocumentType(e.to_string())
            }
            RegistrationError::DuplicateRegistrationAttempt(existing) => {
                ApiError::DuplicateRegistration(existing)
            }
            e @ RegistrationError::PaymentNotConfirmed { .. } => {
                ApiError::PaymentNotConfirmed(e.to_string())
            }
            RegistrationError::InvalidTransition(msg) => ApiError::InvalidTransition(msg),
            e @ RegistrationError::NotFound(_) => ApiError::NotFound(e.to_string()),
            RegistrationError::Validation(msg) => ApiError::Validation(msg),
            RegistrationError::Database(e) => e.into(),
            RegistrationError::Store(msg) => ApiError::Internal(format!("Store error: {}", msg)),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is busy, retry shortly".into())
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();

        let message = match details.as_slice() {
            [] => "Request validation failed".to_string(),
            [only] => only.message.clone(),
            many => format!("{} validation errors", many.len()),
        };

        ApiError::Validation(message)
    }
}
