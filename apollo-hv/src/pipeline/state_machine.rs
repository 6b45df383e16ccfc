//! Report state machine
//!
//! ```text
//! pending ──detected──▶ verified
//!    │
//!    └──not detected──▶ false_alarm
//! ```
//!
//! Both targets are terminal. The verdict row is written before the report
//! row is touched; if the second write fails the report stays pending with
//! the verdict already attached, and a later pass may add another.

use super::inference::ClassifierVerdict;
use super::store::ReportStore;
use crate::error::{PipelineError, PipelineResult};
use apollo_common::db::{Report, ReportStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

/// Result of a successful transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub report_id: i64,
    pub verification_id: i64,
    pub status: ReportStatus,
}

pub struct ReportStateMachine {
    store: Arc<dyn ReportStore>,
}

impl ReportStateMachine {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Terminal status a verdict leads to
    pub fn target_status(detected: bool) -> ReportStatus {
        if detected {
            ReportStatus::Verified
        } else {
            ReportStatus::FalseAlarm
        }
    }

    /// Record `verdict` for `report` and move it to its terminal state
    pub async fn transition(
        &self,
        report: &Report,
        verdict: ClassifierVerdict,
    ) -> PipelineResult<Transition> {
        let report_id = report.report_id;
        let target = Self::target_status(verdict.detected);

        let current = self.store.report_status(report_id).await?;
        if current.is_terminal() {
            return Err(PipelineError::IllegalTransition {
                report_id,
                from: current,
                to: target,
            });
        }

        let new_verdict = verdict.into_verdict(report_id, Utc::now());
        let verification_id = self.store.insert_verdict(&new_verdict).await?;

        if let Err(e) = self.store.mark_report(report_id, target).await {
            error!(
                report_id,
                verification_id,
                "Verdict stored but report status update failed, report stays pending: {}",
                e
            );
            return Err(e);
        }

        info!(
            report_id,
            verification_id,
            status = %target,
            confidence = new_verdict.confidence_score,
            "Report transitioned"
        );

        Ok(Transition {
            report_id,
            verification_id,
            status: target,
        })
    }
}
