//! Database access for apollo-hv

pub mod media;
pub mod reports;
pub mod verdicts;

use crate::error::PipelineResult;
use crate::pipeline::{BlobStore, ReportStore};
use apollo_common::db::{MediaBlob, NewVerdict, Report, ReportStatus};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// SQLite-backed report, verdict and blob store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn claim_pending(&self, limit: u32) -> PipelineResult<Vec<Report>> {
        Ok(reports::load_pending(&self.pool, limit).await?)
    }

    async fn report_status(&self, report_id: i64) -> PipelineResult<ReportStatus> {
        Ok(reports::get_status(&self.pool, report_id).await?)
    }

    async fn insert_verdict(&self, verdict: &NewVerdict) -> PipelineResult<i64> {
        Ok(verdicts::insert_verdict(&self.pool, verdict).await?)
    }

    async fn mark_report(&self, report_id: i64, status: ReportStatus) -> PipelineResult<()> {
        Ok(reports::mark_report(&self.pool, report_id, status).await?)
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn get(&self, media_id: i64) -> PipelineResult<Option<MediaBlob>> {
        Ok(media::get_media(&self.pool, media_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_common::db::{
        FireClassification, FireType, Location, MediaRef, SeverityLevel, SpreadPotential,
    };
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apollo_common::db::init_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn location() -> Location {
        Location {
            latitude: 7.07,
            longitude: 125.6,
            address: "Davao City".to_string(),
        }
    }

    async fn seed_report(store: &SqliteStore) -> (i64, i64) {
        let media_id = media::insert_media(store.pool(), 9, "image/jpeg", "fire.jpg", b"\xFF\xD8\xFF")
            .await
            .unwrap();
        let report_id =
            reports::insert_report(store.pool(), 9, MediaRef::Image(media_id), &location(), Utc::now())
                .await
                .unwrap();
        (report_id, media_id)
    }

    #[tokio::test]
    async fn test_inserted_report_is_pending() {
        let store = store().await;
        let (report_id, media_id) = seed_report(&store).await;

        let report = reports::get_report(store.pool(), report_id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert!(!report.verified);
        assert_eq!(report.media, MediaRef::Image(media_id));
        assert_eq!(report.location, location());

        let blob = store.get(media_id).await.unwrap().unwrap();
        assert_eq!(blob.file_data, b"\xFF\xD8\xFF");
        assert!(store.get(media_id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_pending_is_ordered_and_limited() {
        let store = store().await;
        let mut ids = Vec::new();
        for _ in 0..7 {
            ids.push(seed_report(&store).await.0);
        }
        store.mark_report(ids[1], ReportStatus::Verified).await.unwrap();

        let claimed: Vec<i64> = store
            .claim_pending(5)
            .await
            .unwrap()
            .iter()
            .map(|r| r.report_id)
            .collect();
        assert_eq!(claimed, vec![ids[0], ids[2], ids[3], ids[4], ids[5]]);
    }

    #[tokio::test]
    async fn test_rows_without_single_media_never_fill_the_batch() {
        let store = store().await;

        // Tables from before the media CHECK can still hold such rows
        sqlx::query("PRAGMA ignore_check_constraints = ON")
            .execute(store.pool())
            .await
            .unwrap();
        let (_, media_id) = seed_report(&store).await;
        for _ in 0..5 {
            sqlx::query(
                "INSERT INTO reports (user_id, image_id, video_id, latitude, longitude, address, submitted_at) \
                 VALUES (1, ?, ?, 0, 0, 'nowhere', '2025-06-01T00:00:00Z')",
            )
            .bind(media_id)
            .bind(media_id)
            .execute(store.pool())
            .await
            .unwrap();
        }
        sqlx::query(
            "INSERT INTO reports (user_id, latitude, longitude, address, submitted_at) \
             VALUES (1, 0, 0, 'nowhere', '2025-06-01T00:00:00Z')",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query("PRAGMA ignore_check_constraints = OFF")
            .execute(store.pool())
            .await
            .unwrap();
        let (good, _) = seed_report(&store).await;

        let claimed: Vec<i64> = store
            .claim_pending(5)
            .await
            .unwrap()
            .iter()
            .map(|r| r.report_id)
            .collect();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[1], good);
    }

    #[tokio::test]
    async fn test_mark_report_sets_verified_flag() {
        let store = store().await;
        let (report_id, _) = seed_report(&store).await;

        store.mark_report(report_id, ReportStatus::FalseAlarm).await.unwrap();
        let report = reports::get_report(store.pool(), report_id).await.unwrap().unwrap();
        assert!(report.verified);
        assert_eq!(report.status, ReportStatus::FalseAlarm);
        assert_eq!(
            reports::count_by_status(store.pool(), ReportStatus::FalseAlarm).await.unwrap(),
            1
        );

        assert!(store.mark_report(9999, ReportStatus::Verified).await.is_err());
    }

    #[tokio::test]
    async fn test_verdict_columns() {
        let store = store().await;
        let (report_id, _) = seed_report(&store).await;

        store
            .insert_verdict(&NewVerdict {
                report_id,
                detected: false,
                confidence_score: 10.0,
                verified_at: Utc::now(),
                classification: None,
            })
            .await
            .unwrap();
        store
            .insert_verdict(&NewVerdict {
                report_id,
                detected: true,
                confidence_score: 87.0,
                verified_at: Utc::now(),
                classification: Some(FireClassification {
                    fire_type: FireType::Large,
                    severity_level: SeverityLevel::Severe,
                    spread_potential: SpreadPotential::Low,
                }),
            })
            .await
            .unwrap();

        let stored = verdicts::list_for_report(store.pool(), report_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(!stored[0].detected);
        assert!(stored[0].classification.is_none());
        assert_eq!(stored[1].confidence_score, 87.0);
        assert_eq!(
            stored[1].classification.map(|c| c.fire_type),
            Some(FireType::Large)
        );

        let raw: (Option<String>,) =
            sqlx::query_as("SELECT fire_type FROM verdicts WHERE verification_id = ?")
                .bind(stored[0].verification_id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert!(raw.0.is_none());
    }
}
