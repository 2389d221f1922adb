//! Registration endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    ApprovalRequest, CreateRegistrationRequest, DocumentReference, Registration,
    UploadDocumentRequest,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// Confirm a paid intent into a registration.
///
/// POST /api/v1/registrations
pub async fn create_registration(
    State(state): State<AppState>,
    Json(request): Json<CreateRegistrationRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    request.validate()?;

    let registration = state
        .services
        .ledger
        .create_from_client(&request, &state.services.payments)
        .await?;

    info!(
        registration_id = %registration.id,
        event_id = %registration.event_id,
        payment_intent_id = %registration.payment_intent_id,
        "Registration created"
    );

    Ok((StatusCode::CREATED, Json(registration)))
}

/// GET /api/v1/registrations/:registration_id
pub async fn get_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let registration = state.services.ledger.find(registration_id).await?;
    Ok(Json(registration))
}

/// Attach an identity or licence document for review.
///
/// PUT /api/v1/registrations/:registration_id/document
pub async fn upload_document(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
    Json(request): Json<UploadDocumentRequest>,
) -> Result<Json<Registration>, ApiError> {
    request.validate()?;

    let registration = state
        .services
        .documents
        .upload_document(
            registration_id,
            DocumentReference {
                document_type: request.document_type,
                document_url: request.document_url,
            },
        )
        .await?;

    Ok(Json(registration))
}

/// Approve or reject a pending registration.
///
/// PUT /api/v1/registrations/:registration_id/approval
pub async fn review_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<Registration>, ApiError> {
    request.validate()?;
    let decision = request.into_decision().map_err(ApiError::Validation)?;

    let registration = state
        .services
        .documents
        .review(registration_id, decision)
        .await?;

    info!(
        registration_id = %registration.id,
        approval_status = ?registration.approval_status,
        "Registration reviewed"
    );

    Ok(Json(registration))
}
