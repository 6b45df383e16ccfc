//! Verification control endpoints
//!
//! - `POST /verification/toggle`: switch automated verification on or off
//! - `GET /verification/status`: toggle state, cadence, and the last batch

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::scheduler::BatchSummary;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub message: String,
}

/// POST /verification/toggle
///
/// Body: `{"toggle_state": true|false}`. Anything other than a JSON boolean
/// (including a missing key, `0`/`1`, or `"true"`) is rejected with 400.
pub async fn toggle_verification(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ToggleResponse>> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let enabled = body
        .get("toggle_state")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            ApiError::BadRequest("Invalid toggle state. Must be true or false.".to_string())
        })?;

    let previous = state.toggle.set(enabled);
    info!(enabled, previous, "Verification toggle set via API");

    Ok(Json(ToggleResponse {
        message: format!(
            "Automated verification toggled {}",
            if enabled { "on" } else { "off" }
        ),
    }))
}

#[derive(Debug, Serialize)]
pub struct VerificationStatus {
    pub enabled: bool,
    pub interval_secs: u64,
    pub batch_size: u32,
    pub iterations: u64,
    pub pending_reports: i64,
    pub last_batch: Option<BatchSummary>,
}

/// GET /verification/status
pub async fn verification_status(
    State(state): State<AppState>,
) -> ApiResult<Json<VerificationStatus>> {
    let pending_reports = crate::db::reports::count_by_status(
        &state.db,
        apollo_common::db::ReportStatus::Pending,
    )
    .await?;

    Ok(Json(VerificationStatus {
        enabled: state.toggle.is_enabled(),
        interval_secs: state.config.interval_secs,
        batch_size: state.config.batch_size,
        iterations: state.scheduler.iterations(),
        pending_reports,
        last_batch: state.scheduler.last_batch().await,
    }))
}

pub fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/verification/toggle", post(toggle_verification))
        .route("/verification/status", get(verification_status))
}
