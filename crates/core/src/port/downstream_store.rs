// Downstream Job Store Port (Interface)
// Benchmark jobs and their compliance runners, as far as the engine touches them.
// Runners are written by the compliance engine; this side only reads and retries them.

use crate::domain::BenchmarkJobStatus;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait DownstreamJobStore: Send + Sync {
    /// Statuses of the given benchmark jobs; unknown IDs are absent
    async fn benchmark_job_statuses(&self, ids: &[i64]) -> Result<HashMap<i64, BenchmarkJobStatus>>;

    /// FAILED/TIMEOUT runners with retry_count < `max_attempts` and untouched
    /// since `updated_before` -> CREATED, retry_count + 1
    async fn retry_failed_runners(
        &self,
        max_attempts: i32,
        updated_before: i64,
        now: i64,
    ) -> Result<u64>;
}
