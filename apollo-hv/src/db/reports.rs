//! Report persistence

use apollo_common::db::{Location, MediaRef, Report, ReportRow, ReportStatus};
use apollo_common::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::warn;

const REPORT_COLUMNS: &str = "report_id, user_id, image_id, video_id, latitude, longitude, \
                              address, submitted_at, verified, status";

/// Pending reports in ascending id order, at most `limit`
///
/// Rows without exactly one media reference never reach the LIMIT, so they
/// cannot occupy batch slots. Any other row that fails to load is logged
/// and left out of the result.
pub async fn load_pending(pool: &SqlitePool, limit: u32) -> Result<Vec<Report>> {
    let rows: Vec<ReportRow> = sqlx::query_as(&format!(
        "SELECT {} FROM reports \
         WHERE status = 'pending' AND ((image_id IS NULL) <> (video_id IS NULL)) \
         ORDER BY report_id ASC LIMIT ?",
        REPORT_COLUMNS
    ))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let report_id = row.report_id;
            match Report::try_from(row) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(report_id, "Skipping unloadable report: {}", e);
                    None
                }
            }
        })
        .collect())
}

pub async fn get_report(pool: &SqlitePool, report_id: i64) -> Result<Option<Report>> {
    let row: Option<ReportRow> = sqlx::query_as(&format!(
        "SELECT {} FROM reports WHERE report_id = ?",
        REPORT_COLUMNS
    ))
    .bind(report_id)
    .fetch_optional(pool)
    .await?;

    row.map(Report::try_from).transpose()
}

pub async fn get_status(pool: &SqlitePool, report_id: i64) -> Result<ReportStatus> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM reports WHERE report_id = ?")
        .bind(report_id)
        .fetch_optional(pool)
        .await?;

    status
        .ok_or_else(|| Error::NotFound(format!("report {}", report_id)))?
        .parse()
}

/// Set `verified = 1` and `status`
pub async fn mark_report(pool: &SqlitePool, report_id: i64, status: ReportStatus) -> Result<()> {
    let updated = sqlx::query("UPDATE reports SET verified = 1, status = ? WHERE report_id = ?")
        .bind(status.as_str())
        .bind(report_id)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!("report {}", report_id)));
    }
    Ok(())
}

/// Insert a new pending report; returns its id
pub async fn insert_report<'e, E>(
    executor: E,
    user_id: i64,
    media: MediaRef,
    location: &Location,
    submitted_at: DateTime<Utc>,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (image_id, video_id) = media.to_columns();

    let result = sqlx::query(
        r#"
        INSERT INTO reports (user_id, image_id, video_id, latitude, longitude, address, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(image_id)
    .bind(video_id)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(&location.address)
    .bind(submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true))
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Number of reports per status
pub async fn count_by_status(pool: &SqlitePool, status: ReportStatus) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE status = ?")
        .bind(status.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
