// Describe Job Store Port (Interface)
//
// Every transition is a single conditional update guarded by the job's
// current status. A `false` return means the guard did not match and
// nothing was written.

use crate::domain::{
    DescribeJob, DescribeJobStatus, JobCompletion, JobId, NewDescribeJob,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait DescribeJobStore: Send + Sync {
    /// Insert a CREATED job unless a non-terminal job exists for the same
    /// (connection, resource type). Returns None when the guard blocked it.
    async fn create_job(&self, job: &NewDescribeJob, now: i64) -> Result<Option<DescribeJob>>;

    async fn get_job(&self, id: JobId) -> Result<Option<DescribeJob>>;

    /// Jobs for the given IDs; missing IDs are simply absent
    async fn jobs_by_ids(&self, ids: &[JobId]) -> Result<Vec<DescribeJob>>;

    /// Most recently created job for a (connection, resource type) pair
    async fn latest_job(&self, connection_id: &str, resource_type: &str)
        -> Result<Option<DescribeJob>>;

    /// QUEUED jobs created at or after `since`
    async fn count_queued_created_since(&self, since: i64) -> Result<u64>;

    /// Jobs not in CREATED whose updated_at is at or after `since`
    async fn count_dispatched_updated_since(&self, since: i64) -> Result<u64>;

    /// Up to `limit` CREATED jobs in random order
    async fn random_created_jobs(&self, limit: u32) -> Result<Vec<DescribeJob>>;

    /// In-flight job count per resource type
    async fn in_flight_counts(&self) -> Result<HashMap<String, u64>>;

    /// CREATED/QUEUED -> QUEUED
    async fn mark_queued(&self, id: JobId, now: i64) -> Result<bool>;

    /// CREATED/QUEUED -> IN_PROGRESS
    async fn mark_in_progress(&self, id: JobId, now: i64) -> Result<bool>;

    /// IN_PROGRESS -> OLD_RESOURCE_DELETION / REMOVING_RESOURCES
    async fn advance_running(&self, id: JobId, status: DescribeJobStatus, now: i64)
        -> Result<bool>;

    /// Non-terminal (or same terminal, for replays) -> terminal
    async fn complete(&self, id: JobId, completion: &JobCompletion, now: i64) -> Result<bool>;

    /// CREATED/QUEUED -> FAILED after a delivery error
    async fn mark_dispatch_failed(
        &self,
        id: JobId,
        error_code: &str,
        message: &str,
        now: i64,
    ) -> Result<bool>;

    /// Persist the transport-assigned sequence number
    async fn set_sequence_number(&self, id: JobId, sequence: u64) -> Result<()>;

    /// Running jobs with updated_at before `updated_before` -> TIMEOUT
    async fn timeout_running(&self, updated_before: i64, now: i64) -> Result<u64>;

    /// Jobs in `status` with updated_at before `updated_before`
    async fn stale_jobs(&self, status: DescribeJobStatus, updated_before: i64)
        -> Result<Vec<DescribeJob>>;

    /// `expected` -> FAILED, only if still untouched since `updated_before`
    async fn fail_stale(
        &self,
        id: JobId,
        expected: DescribeJobStatus,
        updated_before: i64,
        message: &str,
        now: i64,
    ) -> Result<bool>;

    /// FAILED/TIMEOUT jobs created at or after `created_since`
    async fn retry_candidates(&self, created_since: i64) -> Result<Vec<DescribeJob>>;

    /// FAILED/TIMEOUT -> CREATED, retry_count + 1, error fields cleared.
    /// Refused while another job for the pair is active or a newer one exists.
    async fn requeue(&self, id: JobId, now: i64) -> Result<bool>;
}

/// In-memory store for unit tests; mirrors the SQLite guards
pub mod mocks {
    use super::*;
    use crate::domain::{
        status_set, BenchmarkJobStatus, JobSequencer, NewJobSequencer, NextJob, RunnerStatus,
        SequencerStatus,
    };
    use crate::port::{DownstreamJobStore, JobSequencerStore};
    use rand::seq::SliceRandom;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct BenchmarkJobRecord {
        pub id: i64,
        pub benchmark_id: String,
        pub status: BenchmarkJobStatus,
    }

    #[derive(Debug, Clone)]
    pub struct RunnerRecord {
        pub id: i64,
        pub benchmark_job_id: i64,
        pub connection_id: String,
        pub status: RunnerStatus,
        pub retry_count: i32,
        pub updated_at: i64,
    }

    #[derive(Default)]
    struct State {
        jobs: Vec<DescribeJob>,
        sequencers: Vec<JobSequencer>,
        analytics_jobs: Vec<i64>,
        benchmark_jobs: Vec<BenchmarkJobRecord>,
        runners: Vec<RunnerRecord>,
        next_id: i64,
        fail_counts: bool,
        fail_writes: bool,
    }

    impl State {
        fn next_id(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }
    }

    #[derive(Default)]
    pub struct InMemoryJobStore {
        state: Mutex<State>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert a job as-is (any status / timestamps) and return its ID
        pub fn seed(&self, mut job: DescribeJob) -> JobId {
            let mut state = self.state.lock().unwrap();
            job.id = state.next_id();
            let id = job.id;
            state.jobs.push(job);
            id
        }

        pub fn job(&self, id: JobId) -> Option<DescribeJob> {
            let state = self.state.lock().unwrap();
            state.jobs.iter().find(|j| j.id == id).cloned()
        }

        pub fn all_jobs(&self) -> Vec<DescribeJob> {
            self.state.lock().unwrap().jobs.clone()
        }

        /// Overwrite a job's status directly (simulates an external writer)
        pub fn force_status(&self, id: JobId, status: DescribeJobStatus) {
            let mut state = self.state.lock().unwrap();
            if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
                job.status = status;
            }
        }

        /// Make count queries fail until reset
        pub fn fail_counts(&self, fail: bool) {
            self.state.lock().unwrap().fail_counts = fail;
        }

        /// Make conditional job transitions fail until reset
        pub fn fail_writes(&self, fail: bool) {
            self.state.lock().unwrap().fail_writes = fail;
        }

        fn check_writes(&self) -> Result<()> {
            if self.state.lock().unwrap().fail_writes {
                return Err(crate::AppError::Database("write failed".to_string()));
            }
            Ok(())
        }

        pub fn analytics_jobs(&self) -> Vec<i64> {
            self.state.lock().unwrap().analytics_jobs.clone()
        }

        pub fn benchmark_jobs(&self) -> Vec<BenchmarkJobRecord> {
            self.state.lock().unwrap().benchmark_jobs.clone()
        }

        pub fn runners(&self) -> Vec<RunnerRecord> {
            self.state.lock().unwrap().runners.clone()
        }

        pub fn seed_benchmark_job(&self, benchmark_id: &str) -> i64 {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id();
            state.benchmark_jobs.push(BenchmarkJobRecord {
                id,
                benchmark_id: benchmark_id.to_string(),
                status: BenchmarkJobStatus::Created,
            });
            id
        }

        /// Runner row as the compliance engine would write it
        pub fn seed_runner(&self, benchmark_job_id: i64, connection_id: &str, now: i64) -> i64 {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id();
            state.runners.push(RunnerRecord {
                id,
                benchmark_job_id,
                connection_id: connection_id.to_string(),
                status: RunnerStatus::Created,
                retry_count: 0,
                updated_at: now,
            });
            id
        }

        pub fn set_benchmark_status(&self, id: i64, status: BenchmarkJobStatus) {
            let mut state = self.state.lock().unwrap();
            if let Some(job) = state.benchmark_jobs.iter_mut().find(|j| j.id == id) {
                job.status = status;
            }
        }

        pub fn set_runner(&self, id: i64, status: RunnerStatus, updated_at: i64) {
            let mut state = self.state.lock().unwrap();
            if let Some(runner) = state.runners.iter_mut().find(|r| r.id == id) {
                runner.status = status;
                runner.updated_at = updated_at;
            }
        }

        fn transition(
            &self,
            id: JobId,
            sources: &[DescribeJobStatus],
            apply: impl FnOnce(&mut DescribeJob),
        ) -> bool {
            let mut state = self.state.lock().unwrap();
            match state
                .jobs
                .iter_mut()
                .find(|j| j.id == id && j.deleted_at.is_none() && sources.contains(&j.status))
            {
                Some(job) => {
                    apply(job);
                    true
                }
                None => false,
            }
        }
    }

    #[async_trait]
    impl DescribeJobStore for InMemoryJobStore {
        async fn create_job(&self, new: &NewDescribeJob, now: i64) -> Result<Option<DescribeJob>> {
            let mut state = self.state.lock().unwrap();
            let active = state.jobs.iter().any(|j| {
                j.connection_id == new.connection_id
                    && j.resource_type == new.resource_type
                    && j.deleted_at.is_none()
                    && status_set::NON_TERMINAL.contains(&j.status)
            });
            if active {
                return Ok(None);
            }
            let job = DescribeJob {
                id: state.next_id(),
                parent_id: new.parent_id,
                nats_sequence_number: None,
                connection_id: new.connection_id.clone(),
                account_id: new.account_id.clone(),
                connector: new.connector,
                resource_type: new.resource_type.clone(),
                discovery_type: new.discovery_type,
                trigger_type: new.trigger_type,
                status: DescribeJobStatus::Created,
                retry_count: 0,
                error_code: None,
                failure_message: None,
                described_resource_count: 0,
                created_at: now,
                queued_at: None,
                in_progressed_at: None,
                updated_at: now,
                deleted_at: None,
            };
            state.jobs.push(job.clone());
            Ok(Some(job))
        }

        async fn get_job(&self, id: JobId) -> Result<Option<DescribeJob>> {
            Ok(self.job(id))
        }

        async fn jobs_by_ids(&self, ids: &[JobId]) -> Result<Vec<DescribeJob>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .jobs
                .iter()
                .filter(|j| ids.contains(&j.id))
                .cloned()
                .collect())
        }

        async fn latest_job(
            &self,
            connection_id: &str,
            resource_type: &str,
        ) -> Result<Option<DescribeJob>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .jobs
                .iter()
                .filter(|j| {
                    j.connection_id == connection_id
                        && j.resource_type == resource_type
                        && j.deleted_at.is_none()
                })
                .max_by_key(|j| (j.created_at, j.id))
                .cloned())
        }

        async fn count_queued_created_since(&self, since: i64) -> Result<u64> {
            let state = self.state.lock().unwrap();
            if state.fail_counts {
                return Err(crate::AppError::Database("count failed".to_string()));
            }
            Ok(state
                .jobs
                .iter()
                .filter(|j| j.status == DescribeJobStatus::Queued && j.created_at >= since)
                .count() as u64)
        }

        async fn count_dispatched_updated_since(&self, since: i64) -> Result<u64> {
            let state = self.state.lock().unwrap();
            if state.fail_counts {
                return Err(crate::AppError::Database("count failed".to_string()));
            }
            Ok(state
                .jobs
                .iter()
                .filter(|j| j.status != DescribeJobStatus::Created && j.updated_at >= since)
                .count() as u64)
        }

        async fn random_created_jobs(&self, limit: u32) -> Result<Vec<DescribeJob>> {
            let state = self.state.lock().unwrap();
            let mut created: Vec<DescribeJob> = state
                .jobs
                .iter()
                .filter(|j| j.status == DescribeJobStatus::Created && j.deleted_at.is_none())
                .cloned()
                .collect();
            created.shuffle(&mut rand::thread_rng());
            created.truncate(limit as usize);
            Ok(created)
        }

        async fn in_flight_counts(&self) -> Result<HashMap<String, u64>> {
            let state = self.state.lock().unwrap();
            let mut counts = HashMap::new();
            for job in state
                .jobs
                .iter()
                .filter(|j| status_set::IN_FLIGHT.contains(&j.status))
            {
                *counts.entry(job.resource_type.clone()).or_insert(0) += 1;
            }
            Ok(counts)
        }

        async fn mark_queued(&self, id: JobId, now: i64) -> Result<bool> {
            self.check_writes()?;
            Ok(self.transition(id, status_set::PENDING, |job| {
                job.status = DescribeJobStatus::Queued;
                job.queued_at = Some(now);
                job.updated_at = now;
            }))
        }

        async fn mark_in_progress(&self, id: JobId, now: i64) -> Result<bool> {
            self.check_writes()?;
            Ok(self.transition(id, status_set::PENDING, |job| {
                job.status = DescribeJobStatus::InProgress;
                job.in_progressed_at = Some(now);
                job.updated_at = now;
            }))
        }

        async fn advance_running(
            &self,
            id: JobId,
            status: DescribeJobStatus,
            now: i64,
        ) -> Result<bool> {
            let sources = DescribeJobStatus::sources_for(status);
            self.check_writes()?;
            Ok(self.transition(id, &sources, |job| {
                job.status = status;
                job.updated_at = now;
            }))
        }

        async fn complete(&self, id: JobId, completion: &JobCompletion, now: i64) -> Result<bool> {
            let sources = DescribeJobStatus::sources_for(completion.status);
            self.check_writes()?;
            Ok(self.transition(id, &sources, |job| {
                job.status = completion.status;
                job.error_code = completion.error_code.clone();
                job.failure_message = completion.failure_message.clone();
                job.described_resource_count = completion.described_resource_count;
                job.updated_at = now;
            }))
        }

        async fn mark_dispatch_failed(
            &self,
            id: JobId,
            error_code: &str,
            message: &str,
            now: i64,
        ) -> Result<bool> {
            self.check_writes()?;
            Ok(self.transition(id, status_set::PENDING, |job| {
                job.status = DescribeJobStatus::Failed;
                job.error_code = Some(error_code.to_string());
                job.failure_message = Some(message.to_string());
                job.updated_at = now;
            }))
        }

        async fn set_sequence_number(&self, id: JobId, sequence: u64) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
                job.nats_sequence_number = Some(sequence);
            }
            Ok(())
        }

        async fn timeout_running(&self, updated_before: i64, now: i64) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            let mut swept = 0;
            for job in state.jobs.iter_mut().filter(|j| {
                status_set::RUNNING.contains(&j.status) && j.updated_at < updated_before
            }) {
                job.status = DescribeJobStatus::Timeout;
                job.failure_message = Some("job timed out".to_string());
                job.updated_at = now;
                swept += 1;
            }
            Ok(swept)
        }

        async fn stale_jobs(
            &self,
            status: DescribeJobStatus,
            updated_before: i64,
        ) -> Result<Vec<DescribeJob>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .jobs
                .iter()
                .filter(|j| j.status == status && j.updated_at < updated_before)
                .cloned()
                .collect())
        }

        async fn fail_stale(
            &self,
            id: JobId,
            expected: DescribeJobStatus,
            updated_before: i64,
            message: &str,
            now: i64,
        ) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            match state
                .jobs
                .iter_mut()
                .find(|j| j.id == id && j.status == expected && j.updated_at < updated_before)
            {
                Some(job) => {
                    job.status = DescribeJobStatus::Failed;
                    job.failure_message = Some(message.to_string());
                    job.updated_at = now;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn retry_candidates(&self, created_since: i64) -> Result<Vec<DescribeJob>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .jobs
                .iter()
                .filter(|j| {
                    status_set::RETRYABLE.contains(&j.status)
                        && j.created_at >= created_since
                        && j.deleted_at.is_none()
                })
                .cloned()
                .collect())
        }

        async fn requeue(&self, id: JobId, now: i64) -> Result<bool> {
            self.check_writes()?;
            {
                let state = self.state.lock().unwrap();
                let superseded = state.jobs.iter().find(|j| j.id == id).is_some_and(|target| {
                    state.jobs.iter().any(|other| {
                        other.id != target.id
                            && other.connection_id == target.connection_id
                            && other.resource_type == target.resource_type
                            && other.deleted_at.is_none()
                            && (status_set::NON_TERMINAL.contains(&other.status)
                                || other.id > target.id)
                    })
                });
                if superseded {
                    return Ok(false);
                }
            }
            Ok(self.transition(id, status_set::RETRYABLE, |job| {
                job.status = DescribeJobStatus::Created;
                job.retry_count += 1;
                job.error_code = None;
                job.failure_message = None;
                job.queued_at = None;
                job.in_progressed_at = None;
                job.updated_at = now;
            }))
        }
    }

    #[async_trait]
    impl JobSequencerStore for InMemoryJobStore {
        async fn create_sequencer(&self, new: &NewJobSequencer, now: i64) -> Result<JobSequencer> {
            let mut state = self.state.lock().unwrap();
            let sequencer = JobSequencer {
                id: state.next_id(),
                dependency_list: new.dependency_list.clone(),
                dependency_source: new.dependency_source,
                next_job: new.next_job.clone(),
                status: SequencerStatus::WaitingForDependencies,
                failure_message: None,
                created_at: now,
                updated_at: now,
            };
            state.sequencers.push(sequencer.clone());
            Ok(sequencer)
        }

        async fn get_sequencer(&self, id: i64) -> Result<Option<JobSequencer>> {
            let state = self.state.lock().unwrap();
            Ok(state.sequencers.iter().find(|s| s.id == id).cloned())
        }

        async fn list_waiting(&self) -> Result<Vec<JobSequencer>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .sequencers
                .iter()
                .filter(|s| s.status == SequencerStatus::WaitingForDependencies)
                .cloned()
                .collect())
        }

        async fn complete_sequencer(&self, id: i64, now: i64) -> Result<Option<i64>> {
            let mut state = self.state.lock().unwrap();
            let next_job = match state
                .sequencers
                .iter_mut()
                .find(|s| s.id == id && s.status == SequencerStatus::WaitingForDependencies)
            {
                Some(seq) => {
                    seq.status = SequencerStatus::Finished;
                    seq.updated_at = now;
                    seq.next_job.clone()
                }
                None => return Ok(None),
            };
            let downstream_id = state.next_id();
            match next_job {
                NextJob::Analytics => state.analytics_jobs.push(downstream_id),
                NextJob::Benchmark { benchmark_id } => {
                    state.benchmark_jobs.push(BenchmarkJobRecord {
                        id: downstream_id,
                        benchmark_id,
                        status: BenchmarkJobStatus::Created,
                    })
                }
            }
            Ok(Some(downstream_id))
        }

        async fn fail_sequencer(&self, id: i64, message: &str, now: i64) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            match state
                .sequencers
                .iter_mut()
                .find(|s| s.id == id && s.status == SequencerStatus::WaitingForDependencies)
            {
                Some(seq) => {
                    seq.status = SequencerStatus::Failed;
                    seq.failure_message = Some(message.to_string());
                    seq.updated_at = now;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    #[async_trait]
    impl DownstreamJobStore for InMemoryJobStore {
        async fn benchmark_job_statuses(
            &self,
            ids: &[i64],
        ) -> Result<HashMap<i64, BenchmarkJobStatus>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .benchmark_jobs
                .iter()
                .filter(|j| ids.contains(&j.id))
                .map(|j| (j.id, j.status))
                .collect())
        }

        async fn retry_failed_runners(
            &self,
            max_attempts: i32,
            updated_before: i64,
            now: i64,
        ) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            let mut retried = 0;
            for runner in state.runners.iter_mut().filter(|r| {
                matches!(r.status, RunnerStatus::Failed | RunnerStatus::Timeout)
                    && r.retry_count < max_attempts
                    && r.updated_at < updated_before
            }) {
                runner.status = RunnerStatus::Created;
                runner.retry_count += 1;
                runner.updated_at = now;
                retried += 1;
            }
            Ok(retried)
        }
    }
}
