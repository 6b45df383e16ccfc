//! Verification scheduler
//!
//! One background task per process. Each iteration:
//! 1. Toggle off: do nothing
//! 2. Claim up to `batch_size` pending reports, ascending id
//! 3. For each report, serially: fetch media, classify, transition
//! 4. Publish one "reports validated" notification for the batch
//!
//! The toggle is re-read before every report; once it is off the rest of
//! the batch stays pending. A failed report is logged and skipped. Errors
//! and panics escaping an iteration are logged and the loop carries on
//! after a full interval. Cancellation is observed between iterations and
//! while sleeping, never in the middle of a report.

use crate::config::VerifierConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::notifications::NotificationChannel;
use crate::pipeline::state_machine::Transition;
use crate::pipeline::{
    BlobStore, Classifier, InferenceAdapter, MediaFetcher, MediaInput, ReportStateMachine,
    ReportStore, VideoFrameReader,
};
use crate::toggle::VerificationToggle;
use apollo_common::db::{Report, ReportStatus};
use apollo_common::NotificationEvent;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-batch counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub iteration: u64,
    pub claimed: usize,
    pub verified: usize,
    pub false_alarms: usize,
    /// Failed and left pending
    pub skipped: usize,
    /// Not attempted because the toggle was switched off mid-batch
    pub deferred: usize,
    pub completed_at: DateTime<Utc>,
}

/// What one iteration did
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Toggle off, nothing touched
    Disabled,
    /// No pending reports
    Idle,
    Completed(BatchSummary),
}

/// Scheduler progress shared with the HTTP layer
#[derive(Debug, Default)]
pub struct SchedulerStatus {
    iterations: AtomicU64,
    failed_iterations: AtomicU64,
    last_batch: RwLock<Option<BatchSummary>>,
    last_error: RwLock<Option<String>>,
}

impl SchedulerStatus {
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub async fn last_batch(&self) -> Option<BatchSummary> {
        self.last_batch.read().await.clone()
    }

    /// Error from the most recent iteration, if it failed
    ///
    /// Cleared by the next iteration that completes.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Iterations that ended in an error or panic since startup
    pub fn failed_iterations(&self) -> u64 {
        self.failed_iterations.load(Ordering::Relaxed)
    }

    fn next_iteration(&self) -> u64 {
        self.iterations.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn record_batch(&self, summary: BatchSummary) {
        *self.last_batch.write().await = Some(summary);
    }

    pub(crate) async fn record_error(&self, message: String) {
        self.failed_iterations.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write().await = Some(message);
    }

    pub(crate) async fn clear_error(&self) {
        let mut last_error = self.last_error.write().await;
        if let Some(previous) = last_error.take() {
            info!("Verification recovered after: {}", previous);
        }
    }
}

/// Drives pending reports through the pipeline
pub struct VerificationScheduler {
    toggle: Arc<VerificationToggle>,
    store: Arc<dyn ReportStore>,
    fetcher: MediaFetcher,
    adapter: InferenceAdapter,
    state_machine: ReportStateMachine,
    notifications: Arc<NotificationChannel>,
    batch_size: u32,
    interval: Duration,
    status: Arc<SchedulerStatus>,
}

impl VerificationScheduler {
    pub fn new(
        config: &VerifierConfig,
        toggle: Arc<VerificationToggle>,
        store: Arc<dyn ReportStore>,
        blobs: Arc<dyn BlobStore>,
        classifier: Arc<dyn Classifier>,
        frame_reader: Arc<dyn VideoFrameReader>,
        notifications: Arc<NotificationChannel>,
    ) -> Self {
        Self {
            toggle,
            fetcher: MediaFetcher::new(blobs, config.scratch_dir.clone()),
            adapter: InferenceAdapter::new(
                classifier,
                frame_reader,
                config.detection_threshold,
                config.inference_timeout(),
            ),
            state_machine: ReportStateMachine::new(Arc::clone(&store)),
            store,
            notifications,
            batch_size: config.batch_size,
            interval: config.interval(),
            status: Arc::new(SchedulerStatus::default()),
        }
    }

    pub fn status(&self) -> Arc<SchedulerStatus> {
        Arc::clone(&self.status)
    }

    /// Run exactly one scheduler cycle
    pub async fn run_iteration(&self) -> PipelineResult<IterationOutcome> {
        let iteration = self.status.next_iteration();

        if !self.toggle.is_enabled() {
            debug!(iteration, "Automated verification disabled, skipping");
            return Ok(IterationOutcome::Disabled);
        }

        let reports = self.store.claim_pending(self.batch_size).await?;
        if reports.is_empty() {
            debug!(iteration, "No pending reports");
            return Ok(IterationOutcome::Idle);
        }

        info!(iteration, claimed = reports.len(), "Verifying batch");

        let mut summary = BatchSummary {
            iteration,
            claimed: reports.len(),
            verified: 0,
            false_alarms: 0,
            skipped: 0,
            deferred: 0,
            completed_at: Utc::now(),
        };

        for (index, report) in reports.iter().enumerate() {
            if !self.toggle.is_enabled() {
                summary.deferred = reports.len() - index;
                info!(
                    iteration,
                    deferred = summary.deferred,
                    "Verification disabled mid-batch, leaving remaining reports pending"
                );
                break;
            }

            match self.process_report(report).await {
                Ok(transition) => match transition.status {
                    ReportStatus::Verified => summary.verified += 1,
                    _ => summary.false_alarms += 1,
                },
                Err(e) => {
                    summary.skipped += 1;
                    warn!(iteration, report_id = report.report_id, "Skipping report: {}", e);
                    if let PipelineError::StaleScratchFile(path) = &e {
                        discard_stale(path).await;
                    }
                }
            }
        }

        summary.completed_at = Utc::now();
        self.notifications.publish(NotificationEvent::reports_validated());

        info!(
            iteration,
            verified = summary.verified,
            false_alarms = summary.false_alarms,
            skipped = summary.skipped,
            deferred = summary.deferred,
            "Batch complete"
        );

        self.status.record_batch(summary.clone()).await;
        Ok(IterationOutcome::Completed(summary))
    }

    async fn process_report(&self, report: &Report) -> PipelineResult<Transition> {
        // Removed on drop, whatever the outcome
        let scratch = self.fetcher.fetch(report).await?;
        debug!(
            report_id = report.report_id,
            kind = %scratch.kind(),
            content_type = scratch.content_type(),
            "Classifying report media"
        );
        let verdict = self
            .adapter
            .classify(MediaInput::Path(scratch.path().to_path_buf()))
            .await?;
        self.state_machine.transition(report, verdict).await
    }

    /// Spawn the supervised loop
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let join = tokio::spawn(async move { self.supervise(child).await });
        SchedulerHandle { token, join }
    }

    async fn supervise(self: Arc<Self>, token: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Verification scheduler started"
        );

        while !token.is_cancelled() {
            match AssertUnwindSafe(self.run_iteration()).catch_unwind().await {
                Ok(Ok(_)) => self.status.clear_error().await,
                Ok(Err(e)) => {
                    error!("Verification iteration failed: {}", e);
                    self.status.record_error(e.to_string()).await;
                }
                Err(panic) => {
                    let message = panic_message(&*panic);
                    error!("Verification iteration panicked: {}", message);
                    self.status.record_error(format!("panic: {}", message)).await;
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Verification scheduler stopped");
    }
}

async fn discard_stale(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Removed stale scratch file {}", path.display()),
        Err(e) => warn!("Failed to remove stale scratch file {}: {}", path.display(), e),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Running scheduler task
pub struct SchedulerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Request cancellation and wait for the loop to exit
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            warn!("Verification scheduler task ended abnormally: {}", e);
        }
    }
}
