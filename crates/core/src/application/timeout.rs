// Timeout sweep: the backstop for jobs that never got a terminal report

use crate::application::runtime::PeriodicTask;
use crate::config::SchedulerConfig;
use crate::domain::DescribeJobStatus;
use crate::error::Result;
use crate::port::{DescribeJobStore, TimeProvider};
use crate::telemetry::{JOBS_FAILED_STALE_TOTAL, JOBS_TIMED_OUT_TOTAL};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const QUEUED_STALE_MESSAGE: &str = "queued job didn't run";
const CREATED_STALE_MESSAGE: &str = "job is aborted";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: u64,
    pub queued_failed: u64,
    pub created_failed: u64,
}

/// Sweeps silent running jobs to TIMEOUT and fails pending jobs that
/// outlived their discovery interval.
pub struct TimeoutSweeper {
    store: Arc<dyn DescribeJobStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: Arc<SchedulerConfig>,
}

impl TimeoutSweeper {
    pub fn new(
        store: Arc<dyn DescribeJobStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            store,
            time_provider,
            config,
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.config.in_progress_timeout_millis();

        let timed_out = self.store.timeout_running(cutoff, now).await?;
        if timed_out > 0 {
            metrics::counter!(JOBS_TIMED_OUT_TOTAL).increment(timed_out);
            warn!(timed_out, cutoff, "Running jobs swept to TIMEOUT");
        }

        let queued_failed = self
            .fail_stale(DescribeJobStatus::Queued, QUEUED_STALE_MESSAGE, now)
            .await?;
        let created_failed = self
            .fail_stale(DescribeJobStatus::Created, CREATED_STALE_MESSAGE, now)
            .await?;

        let report = SweepReport {
            timed_out,
            queued_failed,
            created_failed,
        };
        info!(
            timed_out = report.timed_out,
            queued_failed = report.queued_failed,
            created_failed = report.created_failed,
            "Timeout sweep finished"
        );
        Ok(report)
    }

    /// Jobs untouched for longer than their own discovery interval. The store
    /// query is prefiltered by the shortest interval; each job is then checked
    /// against its type's interval and failed with a guarded update.
    async fn fail_stale(
        &self,
        status: DescribeJobStatus,
        message: &str,
        now: i64,
    ) -> Result<u64> {
        let prefilter = now - self.config.min_discovery_interval_millis();
        let candidates = self.store.stale_jobs(status, prefilter).await?;

        let mut failed = 0;
        for job in candidates {
            let cutoff = now - self.config.discovery_interval_millis(job.discovery_type);
            if job.updated_at >= cutoff {
                continue;
            }
            if self
                .store
                .fail_stale(job.id, status, cutoff, message, now)
                .await?
            {
                failed += 1;
                warn!(
                    job_id = job.id,
                    connection_id = %job.connection_id,
                    resource_type = %job.resource_type,
                    status = %status,
                    "{message}"
                );
            }
        }

        if failed > 0 {
            metrics::counter!(JOBS_FAILED_STALE_TOTAL, "status" => status.as_str())
                .increment(failed);
        }
        Ok(failed)
    }
}

#[async_trait]
impl PeriodicTask for TimeoutSweeper {
    fn name(&self) -> &'static str {
        "timeout-sweep"
    }

    fn interval(&self) -> Duration {
        self.config.timeout_sweep_interval()
    }

    async fn tick(&self) -> Result<()> {
        self.sweep().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{job_in, NOW};
    use crate::domain::DiscoveryType;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::time_provider::mocks::ManualClock;

    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;

    fn sweeper(store: Arc<InMemoryJobStore>) -> TimeoutSweeper {
        TimeoutSweeper::new(
            store,
            Arc::new(ManualClock::new(NOW)),
            Arc::new(SchedulerConfig::default()),
        )
    }

    fn touched(status: DescribeJobStatus, ago: i64) -> crate::domain::DescribeJob {
        let mut job = job_in(status, "AWS::EC2::Instance");
        job.updated_at = NOW - ago;
        job
    }

    #[tokio::test]
    async fn test_in_progress_timeout_boundary() {
        let store = Arc::new(InMemoryJobStore::new());
        let stale = store.seed(touched(DescribeJobStatus::InProgress, 21 * MINUTE));
        let fresh = store.seed(touched(DescribeJobStatus::InProgress, 19 * MINUTE));

        let report = sweeper(store.clone()).sweep().await.unwrap();

        assert_eq!(report.timed_out, 1);
        assert_eq!(store.job(stale).unwrap().status, DescribeJobStatus::Timeout);
        assert_eq!(store.job(fresh).unwrap().status, DescribeJobStatus::InProgress);
    }

    #[tokio::test]
    async fn test_side_states_also_time_out() {
        let store = Arc::new(InMemoryJobStore::new());
        let id = store.seed(touched(DescribeJobStatus::RemovingResources, 30 * MINUTE));

        sweeper(store.clone()).sweep().await.unwrap();
        assert_eq!(store.job(id).unwrap().status, DescribeJobStatus::Timeout);
    }

    #[tokio::test]
    async fn test_stale_pending_uses_type_interval() {
        let store = Arc::new(InMemoryJobStore::new());
        // Fast interval 8h, Full interval 48h
        let fast_queued = store.seed(touched(DescribeJobStatus::Queued, 9 * HOUR));
        let mut full = touched(DescribeJobStatus::Queued, 9 * HOUR);
        full.discovery_type = DiscoveryType::Full;
        let full_queued = store.seed(full);
        let mut old_full = touched(DescribeJobStatus::Created, 49 * HOUR);
        old_full.discovery_type = DiscoveryType::Full;
        let full_created = store.seed(old_full);

        let report = sweeper(store.clone()).sweep().await.unwrap();

        assert_eq!(report.queued_failed, 1);
        assert_eq!(report.created_failed, 1);
        let failed = store.job(fast_queued).unwrap();
        assert_eq!(failed.status, DescribeJobStatus::Failed);
        assert_eq!(failed.failure_message.as_deref(), Some(QUEUED_STALE_MESSAGE));
        assert_eq!(store.job(full_queued).unwrap().status, DescribeJobStatus::Queued);
        assert_eq!(
            store.job(full_created).unwrap().failure_message.as_deref(),
            Some(CREATED_STALE_MESSAGE)
        );
    }
}
