// SQLite DownstreamJobStore Implementation

use crate::error::map_sqlx_error;
use crate::job_store::SqliteJobStore;
use async_trait::async_trait;
use describer_core::domain::{BenchmarkJobStatus, RunnerStatus};
use describer_core::error::Result;
use describer_core::port::DownstreamJobStore;
use sqlx::{Executor, QueryBuilder, Sqlite};
use std::collections::HashMap;

const ANALYTICS_CREATED: &str = "CREATED";

pub(crate) async fn insert_analytics_job<'e, E>(executor: E, sequencer_id: i64, now: i64) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        INSERT INTO analytics_jobs (sequencer_id, status, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(sequencer_id)
    .bind(ANALYTICS_CREATED)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(map_sqlx_error)
}

pub(crate) async fn insert_benchmark_job<'e, E>(
    executor: E,
    benchmark_id: &str,
    sequencer_id: Option<i64>,
    now: i64,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        INSERT INTO benchmark_jobs (benchmark_id, sequencer_id, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(benchmark_id)
    .bind(sequencer_id)
    .bind(BenchmarkJobStatus::Created.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(map_sqlx_error)
}

#[async_trait]
impl DownstreamJobStore for SqliteJobStore {
    async fn benchmark_job_statuses(&self, ids: &[i64]) -> Result<HashMap<i64, BenchmarkJobStatus>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, status FROM benchmark_jobs WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, String)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(id, status)| -> Result<(i64, BenchmarkJobStatus)> {
                Ok((id, status.parse()?))
            })
            .collect()
    }

    async fn retry_failed_runners(
        &self,
        max_attempts: i32,
        updated_before: i64,
        now: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE compliance_runners
            SET status = ?, retry_count = retry_count + 1,
                failure_message = NULL, updated_at = ?
            WHERE status IN (?, ?) AND retry_count < ? AND updated_at < ?
            "#,
        )
        .bind(RunnerStatus::Created.as_str())
        .bind(now)
        .bind(RunnerStatus::Failed.as_str())
        .bind(RunnerStatus::Timeout.as_str())
        .bind(max_attempts)
        .bind(updated_before)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    const NOW: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60 * 1000;

    async fn setup_store() -> SqliteJobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobStore::new(pool)
    }

    /// Runner row as the compliance engine writes it
    async fn insert_runner(store: &SqliteJobStore, benchmark_job_id: i64, connection_id: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO compliance_runners
                 (benchmark_job_id, connection_id, status, retry_count, created_at, updated_at)
             VALUES (?, ?, 'CREATED', 0, ?, ?)
             RETURNING id",
        )
        .bind(benchmark_job_id)
        .bind(connection_id)
        .bind(NOW)
        .bind(NOW)
        .fetch_one(&store.pool)
        .await
        .unwrap()
    }

    async fn set_runner(store: &SqliteJobStore, id: i64, status: RunnerStatus, updated_at: i64) {
        sqlx::query("UPDATE compliance_runners SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(updated_at)
            .bind(id)
            .execute(&store.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_benchmark_statuses_skip_unknown_ids() {
        let store = setup_store().await;
        let a = insert_benchmark_job(&store.pool, "cis", None, NOW).await.unwrap();
        let b = insert_benchmark_job(&store.pool, "soc2", None, NOW).await.unwrap();
        sqlx::query("UPDATE benchmark_jobs SET status = 'SUCCEEDED' WHERE id = ?")
            .bind(b)
            .execute(&store.pool)
            .await
            .unwrap();

        let statuses = store.benchmark_job_statuses(&[a, b, 404]).await.unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[&a], BenchmarkJobStatus::Created);
        assert_eq!(statuses[&b], BenchmarkJobStatus::Succeeded);
        assert!(store.benchmark_job_statuses(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_failed_runners_respects_backoff_and_cap() {
        let store = setup_store().await;
        let bench = insert_benchmark_job(&store.pool, "cis", None, NOW).await.unwrap();
        let recent = insert_runner(&store, bench, "c1").await;
        let old = insert_runner(&store, bench, "c2").await;
        let done = insert_runner(&store, bench, "c3").await;
        set_runner(&store, recent, RunnerStatus::Failed, NOW - MINUTE).await;
        set_runner(&store, old, RunnerStatus::Timeout, NOW - 10 * MINUTE).await;
        set_runner(&store, done, RunnerStatus::Succeeded, NOW - 10 * MINUTE).await;

        let cutoff = NOW - 5 * MINUTE;
        assert_eq!(store.retry_failed_runners(3, cutoff, NOW).await.unwrap(), 1);

        for _ in 0..4 {
            set_runner(&store, old, RunnerStatus::Failed, NOW - 10 * MINUTE).await;
            store.retry_failed_runners(3, cutoff, NOW).await.unwrap();
        }
        let (status, retry_count): (String, i32) =
            sqlx::query_as("SELECT status, retry_count FROM compliance_runners WHERE id = ?")
                .bind(old)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(retry_count, 3);
        assert_eq!(status, "FAILED");
    }
}
