//! Live notification stream
//!
//! `GET /notifications/stream` attaches the single consumer of the
//! notification queue and streams it as Server-Sent Events. Idle periods
//! produce `: keep-alive` comments. A second concurrent client gets 409.
//! The stream ends when the service begins shutting down, so graceful
//! shutdown is not held open by a connected dashboard.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tracing::{info, warn};

/// GET /notifications/stream
pub async fn notification_stream(
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let consumer = state.notifications.attach().ok_or_else(|| {
        warn!("Rejected notification stream: a consumer is already attached");
        ApiError::Conflict("A notification consumer is already attached".to_string())
    })?;

    info!("Notification stream consumer attached");

    let stream = consumer
        .into_stream()
        .take_until(state.shutdown.clone().cancelled_owned())
        .map(|frame| Ok::<_, Infallible>(frame.into_sse_event()));

    Ok(Sse::new(stream))
}
