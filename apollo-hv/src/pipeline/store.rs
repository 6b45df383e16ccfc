//! Storage seams used by the pipeline

use crate::error::PipelineResult;
use apollo_common::db::{MediaBlob, NewVerdict, Report, ReportStatus};
use async_trait::async_trait;

/// Report and verdict persistence
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Pending reports, ascending by id, at most `limit`
    async fn claim_pending(&self, limit: u32) -> PipelineResult<Vec<Report>>;

    /// Current status of one report
    async fn report_status(&self, report_id: i64) -> PipelineResult<ReportStatus>;

    /// Insert a verdict row; returns its verification id
    async fn insert_verdict(&self, verdict: &NewVerdict) -> PipelineResult<i64>;

    /// Set `verified = 1` and the given terminal status
    async fn mark_report(&self, report_id: i64, status: ReportStatus) -> PipelineResult<()>;
}

/// Media blob lookup
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, media_id: i64) -> PipelineResult<Option<MediaBlob>>;
}
