//! Shared test infrastructure for apollo-hv integration tests
//!
//! - fixtures: in-memory database, seeded reports, PNG payloads
//! - stubs: classifier and video reader stand-ins

#![allow(dead_code)]

pub mod fixtures;
pub mod stubs;

pub use fixtures::*;
pub use stubs::*;

use apollo_hv::db::SqliteStore;
use apollo_hv::pipeline::{Classifier, VideoFrameReader};
use apollo_hv::{
    AppState, NotificationChannel, SchedulerStatus, VerificationScheduler, VerificationToggle,
    VerifierConfig,
};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Config with a short interval and the scratch dir under `scratch_root`
pub fn test_config(scratch_root: &Path) -> VerifierConfig {
    VerifierConfig {
        interval_secs: 1,
        keepalive_ms: 50,
        inference_timeout_secs: 10,
        scratch_dir: scratch_root.join("media"),
        ..VerifierConfig::default()
    }
}

/// Everything a scheduler test needs to drive and observe a scheduler
///
/// The toggle is already enabled.
pub struct Harness {
    pub scheduler: Arc<VerificationScheduler>,
    pub toggle: Arc<VerificationToggle>,
    pub notifications: Arc<NotificationChannel>,
    pub config: VerifierConfig,
}

pub fn harness_with(
    pool: &SqlitePool,
    scratch_root: &Path,
    toggle: Arc<VerificationToggle>,
    classifier: Arc<dyn Classifier>,
    frame_reader: Arc<dyn VideoFrameReader>,
) -> Harness {
    let config = test_config(scratch_root);
    // Scheduler tests run with verification on unless they switch it off
    toggle.enable();
    let notifications = Arc::new(NotificationChannel::new(Duration::from_millis(50)));
    let store = Arc::new(SqliteStore::new(pool.clone()));

    let scheduler = Arc::new(VerificationScheduler::new(
        &config,
        Arc::clone(&toggle),
        store.clone(),
        store,
        classifier,
        frame_reader,
        Arc::clone(&notifications),
    ));

    Harness {
        scheduler,
        toggle,
        notifications,
        config,
    }
}

pub fn harness(pool: &SqlitePool, scratch_root: &Path, classifier: Arc<dyn Classifier>) -> Harness {
    harness_with(
        pool,
        scratch_root,
        Arc::new(VerificationToggle::new()),
        classifier,
        Arc::new(BlankVideoReader),
    )
}

/// App state for router tests (no scheduler running)
pub fn test_app_state(pool: SqlitePool) -> AppState {
    let config = test_config(Path::new("/tmp/apollo-hv-tests"));
    AppState::new(
        pool,
        config.clone(),
        Arc::new(VerificationToggle::new()),
        Arc::new(NotificationChannel::new(config.keepalive())),
        Arc::new(SchedulerStatus::default()),
    )
}
