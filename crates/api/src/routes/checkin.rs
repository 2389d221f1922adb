//! Check-in endpoint handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::{CheckInQuery, CheckInRequest, CheckInResponse, EventOverview};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// Consume a scanned check-in token.
///
/// POST /api/v1/checkin
///
/// A second scan of the same token is still a 200 with
/// `alreadyCheckedIn: true`.
pub async fn check_in(
    State(state): State<AppState>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, ApiError> {
    request.validate()?;

    let outcome = state
        .services
        .checkin
        .validate_and_check_in(&request.token)
        .await?;

    Ok(Json(outcome.into()))
}

/// GET /api/v1/checkin?eventId=...
pub async fn event_overview(
    State(state): State<AppState>,
    Query(query): Query<CheckInQuery>,
) -> Result<Json<EventOverview>, ApiError> {
    let overview = state.services.checkin.event_overview(query.event_id).await?;
    Ok(Json(overview))
}
