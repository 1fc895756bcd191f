// Job sequencer: triggers a downstream job once every dependency resolved

use crate::application::runtime::PeriodicTask;
use crate::config::SchedulerConfig;
use crate::domain::{
    status_set, DependencySource, DescribeJobStatus, JobSequencer, SequencerStatus,
};
use crate::error::{AppError, Result};
use crate::port::{DescribeJobStore, DownstreamJobStore, JobSequencerStore, TimeProvider};
use crate::telemetry::SEQUENCER_TRANSITIONS_TOTAL;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Describe statuses that count as resolved for sequencing
const DESCRIBE_RESOLVED: &[DescribeJobStatus] = status_set::TERMINAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerOutcome {
    Waiting,
    Finished { downstream_job_id: i64 },
    Failed,
    /// Another replica moved the record first
    AlreadyHandled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerReport {
    pub waiting: usize,
    pub finished: usize,
    pub failed: usize,
}

pub struct JobSequencerService {
    sequencers: Arc<dyn JobSequencerStore>,
    jobs: Arc<dyn DescribeJobStore>,
    downstream: Arc<dyn DownstreamJobStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: Arc<SchedulerConfig>,
}

impl JobSequencerService {
    pub fn new(
        sequencers: Arc<dyn JobSequencerStore>,
        jobs: Arc<dyn DescribeJobStore>,
        downstream: Arc<dyn DownstreamJobStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            sequencers,
            jobs,
            downstream,
            time_provider,
            config,
        }
    }

    pub async fn run_once(&self) -> Result<SequencerReport> {
        let waiting = self.sequencers.list_waiting().await?;
        let mut report = SequencerReport::default();

        for sequencer in &waiting {
            match self.process(sequencer).await? {
                SequencerOutcome::Waiting => report.waiting += 1,
                SequencerOutcome::Finished { .. } => report.finished += 1,
                SequencerOutcome::Failed => report.failed += 1,
                SequencerOutcome::AlreadyHandled => {}
            }
        }

        if !waiting.is_empty() {
            info!(
                waiting = report.waiting,
                finished = report.finished,
                failed = report.failed,
                "Sequencer pass finished"
            );
        }
        Ok(report)
    }

    /// Resolve one record. Resolution or trigger errors mark it Failed; only
    /// a failure to record that Failed status is returned as an error.
    pub async fn process(&self, sequencer: &JobSequencer) -> Result<SequencerOutcome> {
        let resolved = match self.dependencies_resolved(sequencer).await {
            Ok(resolved) => resolved,
            Err(e) => return self.fail(sequencer, &e).await,
        };
        if !resolved {
            debug!(sequencer_id = sequencer.id, "Dependencies still running");
            return Ok(SequencerOutcome::Waiting);
        }

        let now = self.time_provider.now_millis();
        match self.sequencers.complete_sequencer(sequencer.id, now).await {
            Ok(Some(downstream_job_id)) => {
                metrics::counter!(SEQUENCER_TRANSITIONS_TOTAL, "status" => SequencerStatus::Finished.as_str())
                    .increment(1);
                info!(
                    sequencer_id = sequencer.id,
                    next_job = sequencer.next_job.kind(),
                    downstream_job_id,
                    "Dependencies resolved, next job triggered"
                );
                Ok(SequencerOutcome::Finished { downstream_job_id })
            }
            Ok(None) => Ok(SequencerOutcome::AlreadyHandled),
            Err(e) => self.fail(sequencer, &e).await,
        }
    }

    async fn dependencies_resolved(&self, sequencer: &JobSequencer) -> Result<bool> {
        let ids = &sequencer.dependency_list;
        match sequencer.dependency_source {
            DependencySource::Describe => {
                let jobs = self.jobs.jobs_by_ids(ids).await?;
                if let Some(missing) = ids.iter().find(|id| !jobs.iter().any(|j| j.id == **id)) {
                    return Err(AppError::NotFound(format!("describe job {missing}")));
                }
                Ok(jobs.iter().all(|j| DESCRIBE_RESOLVED.contains(&j.status)))
            }
            DependencySource::Benchmark => {
                let statuses = self.downstream.benchmark_job_statuses(ids).await?;
                ids.iter().try_fold(true, |resolved, id| match statuses.get(id) {
                    Some(status) => Ok(resolved && status.is_resolved()),
                    None => Err(AppError::NotFound(format!("benchmark job {id}"))),
                })
            }
        }
    }

    async fn fail(&self, sequencer: &JobSequencer, cause: &AppError) -> Result<SequencerOutcome> {
        error!(
            sequencer_id = sequencer.id,
            error = %cause,
            "Sequencer failed, not retrying"
        );
        let now = self.time_provider.now_millis();
        if self
            .sequencers
            .fail_sequencer(sequencer.id, &cause.to_string(), now)
            .await?
        {
            metrics::counter!(SEQUENCER_TRANSITIONS_TOTAL, "status" => SequencerStatus::Failed.as_str())
                .increment(1);
            Ok(SequencerOutcome::Failed)
        } else {
            Ok(SequencerOutcome::AlreadyHandled)
        }
    }
}

#[async_trait]
impl PeriodicTask for JobSequencerService {
    fn name(&self) -> &'static str {
        "job-sequencer"
    }

    fn interval(&self) -> Duration {
        self.config.sequencer_interval()
    }

    async fn tick(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}
