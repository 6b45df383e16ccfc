//! Verdict persistence

use apollo_common::db::{NewVerdict, Verdict, VerdictRow};
use apollo_common::Result;
use chrono::SecondsFormat;
use sqlx::SqlitePool;

/// Insert a verdict; returns its verification id
///
/// Classification columns stay NULL for undetected fires.
pub async fn insert_verdict(pool: &SqlitePool, verdict: &NewVerdict) -> Result<i64> {
    let labels = verdict.classification.as_ref();

    let result = sqlx::query(
        r#"
        INSERT INTO verdicts (report_id, detected, confidence_score, verified_at,
                              fire_type, severity_level, spread_potential)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(verdict.report_id)
    .bind(verdict.detected)
    .bind(verdict.confidence_score)
    .bind(verdict.verified_at.to_rfc3339_opts(SecondsFormat::Secs, true))
    .bind(labels.map(|c| c.fire_type.as_str()))
    .bind(labels.map(|c| c.severity_level.as_str()))
    .bind(labels.map(|c| c.spread_potential.as_str()))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// All verdicts for one report, oldest first
pub async fn list_for_report(pool: &SqlitePool, report_id: i64) -> Result<Vec<Verdict>> {
    let rows: Vec<VerdictRow> = sqlx::query_as(
        r#"
        SELECT verification_id, report_id, detected, confidence_score, verified_at,
               fire_type, severity_level, spread_potential
        FROM verdicts
        WHERE report_id = ?
        ORDER BY verification_id ASC
        "#,
    )
    .bind(report_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Verdict::try_from).collect()
}
