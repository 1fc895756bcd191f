// SQLite DescribeJobStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use describer_core::domain::{
    status_set, DescribeJob, DescribeJobStatus, JobCompletion, JobId, NewDescribeJob,
};
use describer_core::error::{AppError, Result};
use describer_core::port::DescribeJobStore;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

/// Render a status set as a SQL IN-list body: `'CREATED','QUEUED'`.
/// Values come from the enum, never from input.
pub(crate) fn status_list(statuses: &[DescribeJobStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

const TIMED_OUT_MESSAGE: &str = "job timed out";

/// SQLite-backed store for describe jobs, sequencers and downstream jobs
pub struct SqliteJobStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn execute_guarded<'a>(
        &self,
        query: sqlx::query::Query<'a, Sqlite, sqlx::sqlite::SqliteArguments<'a>>,
    ) -> Result<bool> {
        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl DescribeJobStore for SqliteJobStore {
    async fn create_job(&self, job: &NewDescribeJob, now: i64) -> Result<Option<DescribeJob>> {
        // Insert and active-job check in one statement: no window between them
        let sql = format!(
            r#"
            INSERT INTO describe_jobs (
                parent_id, connection_id, account_id, connector, resource_type,
                discovery_type, trigger_type, status, retry_count,
                described_resource_count, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM describe_jobs
                WHERE connection_id = ? AND resource_type = ?
                  AND deleted_at IS NULL
                  AND status IN ({})
            )
            RETURNING *
            "#,
            status_list(status_set::NON_TERMINAL)
        );

        let row = sqlx::query_as::<_, DescribeJobRow>(&sql)
            .bind(job.parent_id)
            .bind(&job.connection_id)
            .bind(&job.account_id)
            .bind(job.connector.as_str())
            .bind(&job.resource_type)
            .bind(job.discovery_type.as_str())
            .bind(job.trigger_type.as_str())
            .bind(DescribeJobStatus::Created.as_str())
            .bind(now)
            .bind(now)
            .bind(&job.connection_id)
            .bind(&job.resource_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(DescribeJobRow::into_job).transpose()
    }

    async fn get_job(&self, id: JobId) -> Result<Option<DescribeJob>> {
        let row = sqlx::query_as::<_, DescribeJobRow>("SELECT * FROM describe_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(DescribeJobRow::into_job).transpose()
    }

    async fn jobs_by_ids(&self, ids: &[JobId]) -> Result<Vec<DescribeJob>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM describe_jobs WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = builder
            .build_query_as::<DescribeJobRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(DescribeJobRow::into_job).collect()
    }

    async fn latest_job(
        &self,
        connection_id: &str,
        resource_type: &str,
    ) -> Result<Option<DescribeJob>> {
        let row = sqlx::query_as::<_, DescribeJobRow>(
            r#"
            SELECT * FROM describe_jobs
            WHERE connection_id = ? AND resource_type = ? AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(connection_id)
        .bind(resource_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DescribeJobRow::into_job).transpose()
    }

    async fn count_queued_created_since(&self, since: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM describe_jobs WHERE status = ? AND created_at >= ?",
        )
        .bind(DescribeJobStatus::Queued.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count as u64)
    }

    async fn count_dispatched_updated_since(&self, since: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM describe_jobs WHERE status != ? AND updated_at >= ?",
        )
        .bind(DescribeJobStatus::Created.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count as u64)
    }

    async fn random_created_jobs(&self, limit: u32) -> Result<Vec<DescribeJob>> {
        let rows = sqlx::query_as::<_, DescribeJobRow>(
            r#"
            SELECT * FROM describe_jobs
            WHERE status = ? AND deleted_at IS NULL
            ORDER BY RANDOM()
            LIMIT ?
            "#,
        )
        .bind(DescribeJobStatus::Created.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(DescribeJobRow::into_job).collect()
    }

    async fn in_flight_counts(&self) -> Result<HashMap<String, u64>> {
        let sql = format!(
            r#"
            SELECT resource_type, COUNT(*) FROM describe_jobs
            WHERE status IN ({}) AND deleted_at IS NULL
            GROUP BY resource_type
            "#,
            status_list(status_set::IN_FLIGHT)
        );

        let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(resource_type, count)| (resource_type, count as u64))
            .collect())
    }

    async fn mark_queued(&self, id: JobId, now: i64) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE describe_jobs
            SET status = ?, queued_at = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL AND status IN ({})
            "#,
            status_list(status_set::PENDING)
        );

        self.execute_guarded(
            sqlx::query(&sql)
                .bind(DescribeJobStatus::Queued.as_str())
                .bind(now)
                .bind(now)
                .bind(id),
        )
        .await
    }

    async fn mark_in_progress(&self, id: JobId, now: i64) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE describe_jobs
            SET status = ?, in_progressed_at = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL AND status IN ({})
            "#,
            status_list(status_set::PENDING)
        );

        self.execute_guarded(
            sqlx::query(&sql)
                .bind(DescribeJobStatus::InProgress.as_str())
                .bind(now)
                .bind(now)
                .bind(id),
        )
        .await
    }

    async fn advance_running(
        &self,
        id: JobId,
        status: DescribeJobStatus,
        now: i64,
    ) -> Result<bool> {
        if !status_set::RUNNING.contains(&status) || status == DescribeJobStatus::InProgress {
            return Err(AppError::Validation(format!(
                "{status} is not a running side state"
            )));
        }
        let sql = format!(
            r#"
            UPDATE describe_jobs
            SET status = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL AND status IN ({})
            "#,
            status_list(&DescribeJobStatus::sources_for(status))
        );

        self.execute_guarded(
            sqlx::query(&sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id),
        )
        .await
    }

    async fn complete(&self, id: JobId, completion: &JobCompletion, now: i64) -> Result<bool> {
        if !completion.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "{} is not a terminal status",
                completion.status
            )));
        }
        let sql = format!(
            r#"
            UPDATE describe_jobs
            SET status = ?, error_code = ?, failure_message = ?,
                described_resource_count = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL AND status IN ({})
            "#,
            status_list(&DescribeJobStatus::sources_for(completion.status))
        );

        self.execute_guarded(
            sqlx::query(&sql)
                .bind(completion.status.as_str())
                .bind(&completion.error_code)
                .bind(&completion.failure_message)
                .bind(completion.described_resource_count)
                .bind(now)
                .bind(id),
        )
        .await
    }

    async fn mark_dispatch_failed(
        &self,
        id: JobId,
        error_code: &str,
        message: &str,
        now: i64,
    ) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE describe_jobs
            SET status = ?, error_code = ?, failure_message = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL AND status IN ({})
            "#,
            status_list(status_set::PENDING)
        );

        self.execute_guarded(
            sqlx::query(&sql)
                .bind(DescribeJobStatus::Failed.as_str())
                .bind(error_code)
                .bind(message)
                .bind(now)
                .bind(id),
        )
        .await
    }

    async fn set_sequence_number(&self, id: JobId, sequence: u64) -> Result<()> {
        let sequence = i64::try_from(sequence)
            .map_err(|_| AppError::Validation(format!("sequence number out of range: {sequence}")))?;
        sqlx::query("UPDATE describe_jobs SET nats_sequence_number = ? WHERE id = ?")
            .bind(sequence)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn timeout_running(&self, updated_before: i64, now: i64) -> Result<u64> {
        let sql = format!(
            r#"
            UPDATE describe_jobs
            SET status = ?, failure_message = ?, updated_at = ?
            WHERE status IN ({}) AND updated_at < ? AND deleted_at IS NULL
            "#,
            status_list(status_set::RUNNING)
        );

        let result = sqlx::query(&sql)
            .bind(DescribeJobStatus::Timeout.as_str())
            .bind(TIMED_OUT_MESSAGE)
            .bind(now)
            .bind(updated_before)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn stale_jobs(
        &self,
        status: DescribeJobStatus,
        updated_before: i64,
    ) -> Result<Vec<DescribeJob>> {
        let rows = sqlx::query_as::<_, DescribeJobRow>(
            r#"
            SELECT * FROM describe_jobs
            WHERE status = ? AND updated_at < ? AND deleted_at IS NULL
            "#,
        )
        .bind(status.as_str())
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(DescribeJobRow::into_job).collect()
    }

    async fn fail_stale(
        &self,
        id: JobId,
        expected: DescribeJobStatus,
        updated_before: i64,
        message: &str,
        now: i64,
    ) -> Result<bool> {
        self.execute_guarded(
            sqlx::query(
                r#"
                UPDATE describe_jobs
                SET status = ?, failure_message = ?, updated_at = ?
                WHERE id = ? AND status = ? AND updated_at < ? AND deleted_at IS NULL
                "#,
            )
            .bind(DescribeJobStatus::Failed.as_str())
            .bind(message)
            .bind(now)
            .bind(id)
            .bind(expected.as_str())
            .bind(updated_before),
        )
        .await
    }

    async fn retry_candidates(&self, created_since: i64) -> Result<Vec<DescribeJob>> {
        let sql = format!(
            r#"
            SELECT * FROM describe_jobs
            WHERE status IN ({}) AND created_at >= ? AND deleted_at IS NULL
            ORDER BY id
            "#,
            status_list(status_set::RETRYABLE)
        );

        let rows = sqlx::query_as::<_, DescribeJobRow>(&sql)
            .bind(created_since)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(DescribeJobRow::into_job).collect()
    }

    async fn requeue(&self, id: JobId, now: i64) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE describe_jobs
            SET status = ?, retry_count = retry_count + 1,
                error_code = NULL, failure_message = NULL,
                queued_at = NULL, in_progressed_at = NULL, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL AND status IN ({})
              AND NOT EXISTS (
                SELECT 1 FROM describe_jobs AS other
                WHERE other.connection_id = describe_jobs.connection_id
                  AND other.resource_type = describe_jobs.resource_type
                  AND other.id <> describe_jobs.id
                  AND other.deleted_at IS NULL
                  AND (other.status IN ({}) OR other.id > describe_jobs.id)
              )
            "#,
            status_list(status_set::RETRYABLE),
            status_list(status_set::NON_TERMINAL)
        );

        self.execute_guarded(
            sqlx::query(&sql)
                .bind(DescribeJobStatus::Created.as_str())
                .bind(now)
                .bind(id),
        )
        .await
    }
}

#[derive(sqlx::FromRow)]
struct DescribeJobRow {
    id: i64,
    parent_id: Option<i64>,
    nats_sequence_number: Option<i64>,
    connection_id: String,
    account_id: String,
    connector: String,
    resource_type: String,
    discovery_type: String,
    trigger_type: String,
    status: String,
    retry_count: i32,
    error_code: Option<String>,
    failure_message: Option<String>,
    described_resource_count: i64,
    created_at: i64,
    queued_at: Option<i64>,
    in_progressed_at: Option<i64>,
    updated_at: i64,
    deleted_at: Option<i64>,
}

impl DescribeJobRow {
    fn into_job(self) -> Result<DescribeJob> {
        Ok(DescribeJob {
            id: self.id,
            parent_id: self.parent_id,
            nats_sequence_number: self.nats_sequence_number.map(|n| n as u64),
            connection_id: self.connection_id,
            account_id: self.account_id,
            connector: self.connector.parse()?,
            resource_type: self.resource_type,
            discovery_type: self.discovery_type.parse()?,
            trigger_type: self.trigger_type.parse()?,
            status: self.status.parse()?,
            retry_count: self.retry_count,
            error_code: self.error_code,
            failure_message: self.failure_message,
            described_resource_count: self.described_resource_count,
            created_at: self.created_at,
            queued_at: self.queued_at,
            in_progressed_at: self.in_progressed_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use describer_core::domain::{Connector, DiscoveryType, TriggerType};

    const NOW: i64 = 1_700_000_000_000;

    async fn setup_store() -> SqliteJobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobStore::new(pool)
    }

    fn new_job(connection_id: &str, resource_type: &str) -> NewDescribeJob {
        NewDescribeJob {
            parent_id: None,
            connection_id: connection_id.to_string(),
            account_id: "123456789012".to_string(),
            connector: Connector::Aws,
            resource_type: resource_type.to_string(),
            discovery_type: DiscoveryType::Fast,
            trigger_type: TriggerType::Scheduled,
        }
    }

    fn completion(status: DescribeJobStatus) -> JobCompletion {
        JobCompletion {
            status,
            error_code: None,
            failure_message: None,
            described_resource_count: 4,
        }
    }

    #[test]
    fn test_status_list_rendering() {
        assert_eq!(status_list(status_set::PENDING), "'CREATED','QUEUED'");
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = setup_store().await;
        let job = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();

        let found = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(found, job);
        assert_eq!(found.status, DescribeJobStatus::Created);
        assert_eq!(found.created_at, NOW);
    }

    #[tokio::test]
    async fn test_create_blocked_while_active() {
        let store = setup_store().await;
        let first = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();

        let second = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW + 1)
            .await
            .unwrap();
        assert!(second.is_none());

        // Other pair is unaffected
        assert!(store
            .create_job(&new_job("c2", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .is_some());

        store
            .complete(first.id, &completion(DescribeJobStatus::Succeeded), NOW + 2)
            .await
            .unwrap();
        let third = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW + 3)
            .await
            .unwrap()
            .unwrap();
        let latest = store
            .latest_job("c1", "AWS::EC2::Instance")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, third.id);
    }

    #[tokio::test]
    async fn test_terminal_job_rejects_in_progress() {
        let store = setup_store().await;
        let job = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();
        assert!(store.mark_queued(job.id, NOW).await.unwrap());
        assert!(store
            .complete(job.id, &completion(DescribeJobStatus::Succeeded), NOW)
            .await
            .unwrap());

        assert!(!store.mark_in_progress(job.id, NOW + 1).await.unwrap());
        assert!(!store.mark_queued(job.id, NOW + 1).await.unwrap());
        assert!(!store
            .complete(job.id, &completion(DescribeJobStatus::Failed), NOW + 1)
            .await
            .unwrap());
        // Same terminal report replays cleanly
        assert!(store
            .complete(job.id, &completion(DescribeJobStatus::Succeeded), NOW + 1)
            .await
            .unwrap());

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DescribeJobStatus::Succeeded);
        assert_eq!(stored.described_resource_count, 4);
    }

    #[tokio::test]
    async fn test_in_flight_counts_and_random_created() {
        let store = setup_store().await;
        let a = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();
        store
            .create_job(&new_job("c2", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap();
        store
            .create_job(&new_job("c1", "AWS::S3::Bucket"), NOW)
            .await
            .unwrap();
        store.mark_queued(a.id, NOW).await.unwrap();

        let counts = store.in_flight_counts().await.unwrap();
        assert_eq!(counts.get("AWS::EC2::Instance"), Some(&1));
        assert_eq!(counts.get("AWS::S3::Bucket"), None);

        let created = store.random_created_jobs(10).await.unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|j| j.status == DescribeJobStatus::Created));
        assert_eq!(store.random_created_jobs(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admission_counts() {
        let store = setup_store().await;
        let a = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();
        store
            .create_job(&new_job("c2", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap();
        store.mark_queued(a.id, NOW).await.unwrap();

        assert_eq!(store.count_queued_created_since(NOW - 1).await.unwrap(), 1);
        assert_eq!(store.count_queued_created_since(NOW + 1).await.unwrap(), 0);
        assert_eq!(store.count_dispatched_updated_since(NOW - 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_and_requeue() {
        let store = setup_store().await;
        let job = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();
        store.mark_in_progress(job.id, NOW).await.unwrap();

        assert_eq!(store.timeout_running(NOW, NOW + 10).await.unwrap(), 0);
        assert_eq!(store.timeout_running(NOW + 1, NOW + 10).await.unwrap(), 1);

        let candidates = store.retry_candidates(NOW).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(store.requeue(job.id, NOW + 20).await.unwrap());
        assert!(!store.requeue(job.id, NOW + 21).await.unwrap());

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DescribeJobStatus::Created);
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.failure_message, None);
    }

    #[tokio::test]
    async fn test_requeue_blocked_by_newer_job_for_pair() {
        let store = setup_store().await;
        let old = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();
        store
            .complete(old.id, &completion(DescribeJobStatus::Failed), NOW)
            .await
            .unwrap();
        let newer = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW + 1)
            .await
            .unwrap()
            .unwrap();

        // Newer job active
        assert!(!store.requeue(old.id, NOW + 2).await.unwrap());

        // Newer job terminal: only the newest one may come back
        store
            .complete(newer.id, &completion(DescribeJobStatus::Failed), NOW + 3)
            .await
            .unwrap();
        assert!(!store.requeue(old.id, NOW + 4).await.unwrap());
        assert!(store.requeue(newer.id, NOW + 4).await.unwrap());

        let stored = store.get_job(old.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DescribeJobStatus::Failed);
        assert_eq!(stored.retry_count, 0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_and_sequence_number() {
        let store = setup_store().await;
        let a = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();
        let b = store
            .create_job(&new_job("c2", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();

        store.set_sequence_number(a.id, 77).await.unwrap();
        assert!(store
            .mark_dispatch_failed(b.id, "Throttled", "429", NOW)
            .await
            .unwrap());

        let jobs = store.jobs_by_ids(&[a.id, b.id, 9999]).await.unwrap();
        assert_eq!(jobs.len(), 2);
        let a = jobs.iter().find(|j| j.id == a.id).unwrap();
        let b = jobs.iter().find(|j| j.id == b.id).unwrap();
        assert_eq!(a.nats_sequence_number, Some(77));
        assert_eq!(b.status, DescribeJobStatus::Failed);
        assert_eq!(b.error_code.as_deref(), Some("Throttled"));
    }

    #[tokio::test]
    async fn test_fail_stale_guard() {
        let store = setup_store().await;
        let job = store
            .create_job(&new_job("c1", "AWS::EC2::Instance"), NOW)
            .await
            .unwrap()
            .unwrap();

        let stale = store
            .stale_jobs(DescribeJobStatus::Created, NOW + 1)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);

        // Touched since the listing: guard no longer matches
        store.mark_queued(job.id, NOW + 5).await.unwrap();
        assert!(!store
            .fail_stale(job.id, DescribeJobStatus::Created, NOW + 1, "job is aborted", NOW + 6)
            .await
            .unwrap());
        assert!(store
            .fail_stale(job.id, DescribeJobStatus::Queued, NOW + 6, "queued job didn't run", NOW + 7)
            .await
            .unwrap());
    }
}
