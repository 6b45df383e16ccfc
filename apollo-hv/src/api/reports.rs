//! Report submission endpoint

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::ingest::{ReportSubmission, StoredSubmission};
use crate::AppState;
use apollo_common::NotificationEvent;

/// POST /reports
///
/// Validates the submission, stores blob and report, and announces it on
/// the notification stream. Returns 201 with the new ids.
pub async fn submit_report(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StoredSubmission>)> {
    let Json(body) = body.map_err(|e| match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(e.body_text()),
        _ => ApiError::BadRequest(e.body_text()),
    })?;

    let submission = ReportSubmission::from_json(body)?;
    let stored = submission.store(&state.db).await?;

    state
        .notifications
        .publish(NotificationEvent::report_submitted(&submission.location.address));

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Report routes; base64 media makes bodies far larger than axum's 2 MB
/// default, so the cap comes from `report_max_body_bytes`
pub fn report_routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/reports",
        post(submit_report).layer(DefaultBodyLimit::max(max_body_bytes)),
    )
}
