// SQLite JobSequencerStore Implementation

use crate::downstream_store::{insert_analytics_job, insert_benchmark_job};
use crate::error::map_sqlx_error;
use crate::job_store::SqliteJobStore;
use async_trait::async_trait;
use describer_core::domain::{JobSequencer, NewJobSequencer, NextJob, SequencerId, SequencerStatus};
use describer_core::error::Result;
use describer_core::port::JobSequencerStore;

#[async_trait]
impl JobSequencerStore for SqliteJobStore {
    async fn create_sequencer(&self, new: &NewJobSequencer, now: i64) -> Result<JobSequencer> {
        new.validate()?;
        let dependency_list = serde_json::to_string(&new.dependency_list)?;
        let next_job = serde_json::to_string(&new.next_job)?;

        let row = sqlx::query_as::<_, SequencerRow>(
            r#"
            INSERT INTO job_sequencers (
                dependency_list, dependency_source, next_job, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(dependency_list)
        .bind(new.dependency_source.as_str())
        .bind(next_job)
        .bind(SequencerStatus::WaitingForDependencies.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.into_sequencer()
    }

    async fn get_sequencer(&self, id: SequencerId) -> Result<Option<JobSequencer>> {
        let row = sqlx::query_as::<_, SequencerRow>("SELECT * FROM job_sequencers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(SequencerRow::into_sequencer).transpose()
    }

    async fn list_waiting(&self) -> Result<Vec<JobSequencer>> {
        let rows = sqlx::query_as::<_, SequencerRow>(
            "SELECT * FROM job_sequencers WHERE status = ? ORDER BY id",
        )
        .bind(SequencerStatus::WaitingForDependencies.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(SequencerRow::into_sequencer).collect()
    }

    async fn complete_sequencer(&self, id: SequencerId, now: i64) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Status guard: only one caller wins the WaitingForDependencies row
        let row = sqlx::query_as::<_, SequencerRow>(
            r#"
            UPDATE job_sequencers
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING *
            "#,
        )
        .bind(SequencerStatus::Finished.as_str())
        .bind(now)
        .bind(id)
        .bind(SequencerStatus::WaitingForDependencies.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let sequencer = row.into_sequencer()?;

        let downstream_id = match &sequencer.next_job {
            NextJob::Analytics => insert_analytics_job(&mut *tx, sequencer.id, now).await?,
            NextJob::Benchmark { benchmark_id } => {
                insert_benchmark_job(&mut *tx, benchmark_id, Some(sequencer.id), now).await?
            }
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(Some(downstream_id))
    }

    async fn fail_sequencer(&self, id: SequencerId, message: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE job_sequencers
            SET status = ?, failure_message = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(SequencerStatus::Failed.as_str())
        .bind(message)
        .bind(now)
        .bind(id)
        .bind(SequencerStatus::WaitingForDependencies.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct SequencerRow {
    id: i64,
    dependency_list: String,
    dependency_source: String,
    next_job: String,
    status: String,
    failure_message: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl SequencerRow {
    fn into_sequencer(self) -> Result<JobSequencer> {
        Ok(JobSequencer {
            id: self.id,
            dependency_list: serde_json::from_str(&self.dependency_list)?,
            dependency_source: self.dependency_source.parse()?,
            next_job: serde_json::from_str(&self.next_job)?,
            status: self.status.parse()?,
            failure_message: self.failure_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
