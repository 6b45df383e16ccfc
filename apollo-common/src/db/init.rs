//! Database initialization
//!
//! Creates the SQLite database on first run and provisions the tables the
//! verification pipeline touches. Every statement is idempotent, so startup
//! may run it against an existing database at any time.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database file and provision the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the request handlers read while the scheduler writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Provision tables and default settings on an already-open pool
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_settings_table(pool).await?;
    create_media_storage_table(pool).await?;
    create_reports_table(pool).await?;
    create_verdicts_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the media_storage table (uploaded image/video payloads)
pub async fn create_media_storage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_storage (
            media_id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            file_type TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_data BLOB NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the reports table
///
/// A report references exactly one of `image_id` / `video_id`. The CHECK
/// only applies to tables created by this version; older tables are
/// covered by the claim query filtering on the same condition.
pub async fn create_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            report_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            image_id INTEGER REFERENCES media_storage(media_id),
            video_id INTEGER REFERENCES media_storage(media_id),
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            address TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            verified INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            CHECK ((image_id IS NULL) <> (video_id IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status, report_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the verdicts table
///
/// No UNIQUE constraint on report_id: a report whose status update failed
/// after its verdict was written can collect a second verdict.
pub async fn create_verdicts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verdicts (
            verification_id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL REFERENCES reports(report_id),
            detected INTEGER NOT NULL,
            confidence_score REAL NOT NULL,
            verified_at TEXT NOT NULL,
            fire_type TEXT,
            severity_level TEXT,
            spread_potential TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert default runtime settings that are missing
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "verification_interval_secs", "5").await?;
    ensure_setting(pool, "verification_batch_size", "5").await?;
    ensure_setting(pool, "verification_inference_timeout_secs", "120").await?;
    ensure_setting(pool, "verification_detection_threshold", "0.5").await?;
    ensure_setting(pool, "notification_keepalive_ms", "1000").await?;
    // Empty = <root folder>/tmp/media
    ensure_setting(pool, "verification_scratch_dir", "").await?;
    ensure_setting(pool, "report_max_body_bytes", "67108864").await?;

    Ok(())
}

/// Ensure a setting exists and is non-NULL, writing the default otherwise
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query(
        "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ? AND value IS NULL",
    )
    .bind(default_value)
    .bind(key)
    .execute(pool)
    .await?
    .rows_affected();

    if reset > 0 {
        info!("Reset NULL setting '{}' to default value: {}", key, default_value);
    }

    Ok(())
}
