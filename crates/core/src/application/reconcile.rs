// Result reconciler: applies worker status reports to the job store

use crate::domain::{status_set, DescribeJobResult, DescribeJobStatus, JobCompletion};
use crate::error::{AppError, Result};
use crate::port::{DescribeJobStore, TimeProvider};
use crate::telemetry::RESULTS_APPLIED_TOTAL;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    /// Guard did not match (job already past that status, or unknown)
    Ignored,
}

pub struct ResultReconciler {
    store: Arc<dyn DescribeJobStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ResultReconciler {
    pub fn new(store: Arc<dyn DescribeJobStore>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            store,
            time_provider,
        }
    }

    /// Apply one report. Replays are harmless: a repeated terminal report
    /// rewrites the same fields, and a stale IN_PROGRESS report after a
    /// terminal one is ignored.
    pub async fn apply(&self, result: &DescribeJobResult) -> Result<ReconcileOutcome> {
        let now = self.time_provider.now_millis();
        let status = result.status;

        let applied = match status {
            DescribeJobStatus::InProgress => self.store.mark_in_progress(result.job_id, now).await?,
            DescribeJobStatus::OldResourceDeletion | DescribeJobStatus::RemovingResources => {
                self.store
                    .advance_running(result.job_id, status, now)
                    .await?
            }
            s if status_set::TERMINAL.contains(&s) => {
                let completion = JobCompletion {
                    status,
                    error_code: result.error_code(),
                    failure_message: result.error_message(),
                    described_resource_count: result.described_resource_count(),
                };
                self.store.complete(result.job_id, &completion, now).await?
            }
            _ => {
                return Err(AppError::Validation(format!(
                    "workers cannot report status {status}"
                )))
            }
        };

        if applied {
            metrics::counter!(RESULTS_APPLIED_TOTAL, "status" => status.as_str()).increment(1);
            info!(
                job_id = result.job_id,
                status = %status,
                error_code = result.error_code.as_deref().unwrap_or(""),
                described = result.described_resource_ids.len(),
                "Job result applied"
            );
            Ok(ReconcileOutcome::Applied)
        } else {
            debug!(
                job_id = result.job_id,
                status = %status,
                "Job result ignored by status guard"
            );
            Ok(ReconcileOutcome::Ignored)
        }
    }
}
