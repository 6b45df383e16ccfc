//! Runtime configuration for the verification pipeline
//!
//! Loaded from the `settings` table at startup; values missing or
//! unparsable there fall back to the built-in defaults below.

use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Default request body cap for report submissions
pub const DEFAULT_MAX_REPORT_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Verification pipeline configuration
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Sleep between scheduler iterations (default: 5s)
    pub interval_secs: u64,

    /// Maximum reports claimed per iteration (default: 5)
    pub batch_size: u32,

    /// Deadline for one classification call (default: 120s)
    pub inference_timeout_secs: u64,

    /// Raw detection output must be strictly greater than this (default: 0.5)
    pub detection_threshold: f64,

    /// Idle keep-alive cadence on the notification stream (default: 1000ms)
    pub keepalive_ms: u64,

    /// Directory for scratch copies of report media
    pub scratch_dir: PathBuf,

    /// Request body cap for `POST /reports` (default: 64 MiB)
    pub max_report_body_bytes: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            batch_size: 5,
            inference_timeout_secs: 120,
            detection_threshold: 0.5,
            keepalive_ms: 1000,
            scratch_dir: PathBuf::from("tmp").join("media"),
            max_report_body_bytes: DEFAULT_MAX_REPORT_BODY_BYTES,
        }
    }
}

impl VerifierConfig {
    /// Load configuration from database settings
    ///
    /// An empty `verification_scratch_dir` resolves to `<root>/tmp/media`.
    pub async fn from_database(db_pool: &Pool<Sqlite>, root_folder: &Path) -> Self {
        let mut config = Self {
            scratch_dir: root_folder.join("tmp").join("media"),
            ..Self::default()
        };

        if let Some(v) = load_setting::<u64>(db_pool, "verification_interval_secs").await {
            if v == 0 {
                warn!("verification_interval_secs = 0 would spin the scheduler, keeping {}", config.interval_secs);
            } else {
                config.interval_secs = v;
            }
        }
        if let Some(v) = load_setting::<u32>(db_pool, "verification_batch_size").await {
            if v == 0 {
                warn!("verification_batch_size = 0 would never claim work, keeping {}", config.batch_size);
            } else {
                config.batch_size = v;
            }
        }
        if let Some(v) = load_setting(db_pool, "verification_inference_timeout_secs").await {
            config.inference_timeout_secs = v;
        }
        if let Some(v) = load_setting::<f64>(db_pool, "verification_detection_threshold").await {
            if (0.0..=1.0).contains(&v) {
                config.detection_threshold = v;
            } else {
                warn!("verification_detection_threshold {} outside [0, 1], using default", v);
            }
        }
        if let Some(v) = load_setting::<u64>(db_pool, "notification_keepalive_ms").await {
            if v == 0 {
                warn!("notification_keepalive_ms = 0 would flood the stream, keeping {}", config.keepalive_ms);
            } else {
                config.keepalive_ms = v;
            }
        }
        if let Some(dir) = load_setting::<String>(db_pool, "verification_scratch_dir").await {
            if !dir.trim().is_empty() {
                config.scratch_dir = PathBuf::from(dir);
            }
        }
        if let Some(v) = load_setting::<usize>(db_pool, "report_max_body_bytes").await {
            if v == 0 {
                warn!("report_max_body_bytes = 0 would reject every report, keeping {}", config.max_report_body_bytes);
            } else {
                config.max_report_body_bytes = v;
            }
        }

        config
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_millis(self.keepalive_ms)
    }
}

async fn load_setting<T: FromStr>(db_pool: &Pool<Sqlite>, key: &str) -> Option<T> {
    let value = sqlx::query_scalar::<_, Option<String>>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db_pool)
        .await
        .ok()
        .flatten()
        .flatten()?;

    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Invalid value '{}' for setting '{}', using default", value, key);
            None
        }
    }
}
