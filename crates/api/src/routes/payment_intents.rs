//! Payment intent endpoint handlers.

use axum::{extract::State, Json};
use domain::models::{CreatePaymentIntentRequest, CreatePaymentIntentResponse};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// Open (or reuse) a payment intent for one seat.
///
/// POST /api/v1/payment-intents
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<CreatePaymentIntentResponse>, ApiError> {
    request.validate()?;

    let created = state.services.payments.create_intent(request.into()).await?;

    info!(
        intent_id = %created.intent_id,
        amount_cents = created.amount_cents,
        reused = created.reused,
        "Payment intent ready"
    );

    Ok(Json(created.into()))
}
