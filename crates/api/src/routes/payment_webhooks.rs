//! Payment processor webhook receiver.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use domain::models::WebhookAck;
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::RequestId;

/// Header carrying `t=<unix>,v1=<hex>`.
pub const SIGNATURE_HEADER: &str = "Payment-Signature";

/// Receive a processor status notification.
///
/// POST /api/v1/webhooks/payments
///
/// The raw body is verified before parsing. Replays are acknowledged with
/// `applied: false` so the processor stops retrying.
pub async fn receive_payment_webhook(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .services
        .payments
        .handle_webhook(&body, signature)
        .await?;

    debug!(
        request_id = %request_id.0,
        webhook_event_id = %outcome.event_id,
        intent_id = %outcome.intent_id,
        applied = outcome.applied,
        "Payment webhook acknowledged"
    );

    Ok(Json(WebhookAck {
        received: true,
        applied: outcome.applied,
    }))
}
