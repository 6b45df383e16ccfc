//! apollo-hv library interface
//!
//! Hermes Verifier: background verification of submitted fire reports plus
//! the HTTP surface that controls it and streams its notifications.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod notifications;
pub mod pipeline;
pub mod scheduler;
pub mod toggle;

pub use crate::config::VerifierConfig;
pub use crate::error::{ApiError, ApiResult, PipelineError, PipelineResult};
pub use crate::notifications::NotificationChannel;
pub use crate::scheduler::{IterationOutcome, SchedulerHandle, SchedulerStatus, VerificationScheduler};
pub use crate::toggle::VerificationToggle;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Gate read by the scheduler, written by `/verification/toggle`
    pub toggle: Arc<VerificationToggle>,
    pub notifications: Arc<NotificationChannel>,
    /// Progress and last error reported by the scheduler
    pub scheduler: Arc<SchedulerStatus>,
    pub config: VerifierConfig,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Cancelled on shutdown; ends long-lived responses such as the SSE stream
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: VerifierConfig,
        toggle: Arc<VerificationToggle>,
        notifications: Arc<NotificationChannel>,
        scheduler: Arc<SchedulerStatus>,
    ) -> Self {
        Self {
            db,
            toggle,
            notifications,
            scheduler,
            config,
            startup_time: Utc::now(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::verification_routes())
        .merge(api::report_routes(state.config.max_report_body_bytes))
        .route("/notifications/stream", get(api::notification_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
