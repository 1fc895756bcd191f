// Retry reconciler: re-admits transiently failed jobs

use crate::application::runtime::PeriodicTask;
use crate::config::SchedulerConfig;
use crate::domain::DescribeJob;
use crate::error::Result;
use crate::port::{DescribeJobStore, DownstreamJobStore, TimeProvider};
use crate::telemetry::JOBS_RETRIED_TOTAL;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry decision for one FAILED/TIMEOUT job
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// Error code is on the denylist; never retried
    Permanent,
    /// Older than its discovery interval; the next scheduled job replaces it
    Expired,
}

/// Pure decision rules, separate from the store for testability
pub struct RetryPolicy {
    config: Arc<SchedulerConfig>,
}

impl RetryPolicy {
    pub fn new(config: Arc<SchedulerConfig>) -> Self {
        Self { config }
    }

    pub fn decide(&self, job: &DescribeJob, now_millis: i64) -> RetryDecision {
        if let Some(code) = job.error_code.as_deref() {
            if self.config.is_denylisted(job.connector, code) {
                return RetryDecision::Permanent;
            }
        }
        // At the interval the scheduler creates a fresh job instead
        if job.age_millis(now_millis) >= self.config.discovery_interval_millis(job.discovery_type) {
            return RetryDecision::Expired;
        }
        RetryDecision::Retry
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub requeued: usize,
    pub permanent: usize,
    pub expired: usize,
    pub runners_retried: u64,
}

pub struct RetryReconciler {
    store: Arc<dyn DescribeJobStore>,
    downstream: Arc<dyn DownstreamJobStore>,
    time_provider: Arc<dyn TimeProvider>,
    policy: RetryPolicy,
    config: Arc<SchedulerConfig>,
}

impl RetryReconciler {
    pub fn new(
        store: Arc<dyn DescribeJobStore>,
        downstream: Arc<dyn DownstreamJobStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            store,
            downstream,
            time_provider,
            policy: RetryPolicy::new(config.clone()),
            config,
        }
    }

    pub async fn run_once(&self) -> Result<RetryReport> {
        let now = self.time_provider.now_millis();
        let lookback = now - self.config.max_discovery_interval_millis();
        let candidates = self.store.retry_candidates(lookback).await?;

        let mut report = RetryReport::default();
        for job in candidates {
            match self.policy.decide(&job, now) {
                RetryDecision::Permanent => {
                    report.permanent += 1;
                    debug!(
                        job_id = job.id,
                        error_code = job.error_code.as_deref().unwrap_or(""),
                        "Permanent failure, not retrying"
                    );
                }
                RetryDecision::Expired => report.expired += 1,
                RetryDecision::Retry => match self.store.requeue(job.id, now).await {
                    Ok(true) => {
                        report.requeued += 1;
                        info!(
                            job_id = job.id,
                            connection_id = %job.connection_id,
                            resource_type = %job.resource_type,
                            retry_count = job.retry_count + 1,
                            "Job requeued for retry"
                        );
                    }
                    Ok(false) => {}
                    Err(e) => warn!(job_id = job.id, error = %e, "Failed to requeue job"),
                },
            }
        }
        if report.requeued > 0 {
            metrics::counter!(JOBS_RETRIED_TOTAL, "kind" => "describe")
                .increment(report.requeued as u64);
        }

        report.runners_retried = self
            .downstream
            .retry_failed_runners(
                self.config.runner_max_attempts,
                now - self.config.runner_backoff_millis(),
                now,
            )
            .await?;
        if report.runners_retried > 0 {
            metrics::counter!(JOBS_RETRIED_TOTAL, "kind" => "runner")
                .increment(report.runners_retried);
        }

        info!(
            requeued = report.requeued,
            permanent = report.permanent,
            expired = report.expired,
            runners_retried = report.runners_retried,
            "Retry pass finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl PeriodicTask for RetryReconciler {
    fn name(&self) -> &'static str {
        "retry-reconciler"
    }

    fn interval(&self) -> Duration {
        self.config.scheduling_interval()
    }

    async fn tick(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{job_in, NOW};
    use crate::domain::{DescribeJobStatus, JobCompletion, RunnerStatus};
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::time_provider::mocks::ManualClock;

    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;

    fn reconciler(store: Arc<InMemoryJobStore>) -> RetryReconciler {
        RetryReconciler::new(
            store.clone(),
            store,
            Arc::new(ManualClock::new(NOW)),
            Arc::new(SchedulerConfig::default()),
        )
    }

    fn failed(code: Option<&str>, age: i64) -> DescribeJob {
        let mut job = job_in(DescribeJobStatus::Failed, "AWS::EC2::Instance");
        job.error_code = code.map(str::to_string);
        job.created_at = NOW - age;
        job.updated_at = NOW - age;
        job
    }

    #[tokio::test]
    async fn test_denylisted_code_never_retried() {
        let store = Arc::new(InMemoryJobStore::new());
        let id = store.seed(failed(Some("AccessDenied"), MINUTE));

        let report = reconciler(store.clone()).run_once().await.unwrap();

        assert_eq!(report.permanent, 1);
        assert_eq!(store.job(id).unwrap().status, DescribeJobStatus::Failed);
    }

    #[tokio::test]
    async fn test_transient_failure_requeued() {
        let store = Arc::new(InMemoryJobStore::new());
        let throttled = store.seed(failed(Some("Throttled"), HOUR));
        let mut timeout = failed(None, HOUR);
        timeout.status = DescribeJobStatus::Timeout;
        timeout.resource_type = "AWS::S3::Bucket".to_string();
        let timed_out = store.seed(timeout);

        let report = reconciler(store.clone()).run_once().await.unwrap();

        assert_eq!(report.requeued, 2);
        let job = store.job(throttled).unwrap();
        assert_eq!(job.status, DescribeJobStatus::Created);
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.error_code, None);
        assert_eq!(store.job(timed_out).unwrap().status, DescribeJobStatus::Created);
    }

    #[tokio::test]
    async fn test_job_outside_interval_not_retried() {
        let store = Arc::new(InMemoryJobStore::new());
        // Fast interval is 8h
        let id = store.seed(failed(Some("Throttled"), 9 * HOUR));

        let report = reconciler(store.clone()).run_once().await.unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(store.job(id).unwrap().status, DescribeJobStatus::Failed);
    }

    #[tokio::test]
    async fn test_job_exactly_one_interval_old_is_left_to_scheduler() {
        let store = Arc::new(InMemoryJobStore::new());
        let id = store.seed(failed(Some("Throttled"), 8 * HOUR));

        let report = reconciler(store.clone()).run_once().await.unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(store.job(id).unwrap().status, DescribeJobStatus::Failed);
    }

    #[tokio::test]
    async fn test_superseded_failure_not_requeued() {
        let store = Arc::new(InMemoryJobStore::new());
        let old = store.seed(failed(Some("Throttled"), HOUR));
        let mut manual = job_in(DescribeJobStatus::Created, "AWS::EC2::Instance");
        manual.created_at = NOW - MINUTE;
        let manual = store.seed(manual);

        let report = reconciler(store.clone()).run_once().await.unwrap();
        assert_eq!(report.requeued, 0);
        assert_eq!(store.job(old).unwrap().status, DescribeJobStatus::Failed);

        // Still superseded once the newer job has finished
        let succeeded = JobCompletion {
            status: DescribeJobStatus::Succeeded,
            error_code: None,
            failure_message: None,
            described_resource_count: 1,
        };
        store.complete(manual, &succeeded, NOW).await.unwrap();
        let report = reconciler(store.clone()).run_once().await.unwrap();
        assert_eq!(report.requeued, 0);
        assert_eq!(store.job(old).unwrap().retry_count, 0);
    }

    #[tokio::test]
    async fn test_failed_runner_backoff_and_cap() {
        let store = Arc::new(InMemoryJobStore::new());
        let benchmark = store.seed_benchmark_job("cis");
        let recent = store.seed_runner(benchmark, "c1", NOW);
        let old = store.seed_runner(benchmark, "c2", NOW);
        store.set_runner(recent, RunnerStatus::Failed, NOW - MINUTE);
        store.set_runner(old, RunnerStatus::Failed, NOW - 6 * MINUTE);

        let report = reconciler(store.clone()).run_once().await.unwrap();
        assert_eq!(report.runners_retried, 1);

        // Exhaust the remaining attempts
        for _ in 0..5 {
            store.set_runner(old, RunnerStatus::Timeout, NOW - 6 * MINUTE);
            reconciler(store.clone()).run_once().await.unwrap();
        }
        let runner = store.runners().into_iter().find(|r| r.id == old).unwrap();
        assert_eq!(runner.retry_count, 3);
        assert_eq!(runner.status, RunnerStatus::Timeout);
    }

    #[test]
    fn test_policy_per_connector_denylist() {
        let policy = RetryPolicy::new(Arc::new(SchedulerConfig::default()));
        let job = failed(Some("optinrequired"), MINUTE);
        assert_eq!(policy.decide(&job, NOW), RetryDecision::Permanent);
    }
}
