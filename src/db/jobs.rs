//! SQLite-backed durable job queue
//!
//! Rows move `queued -> running -> (deleted | queued | dead)`. A claim is a
//! single `UPDATE … RETURNING`, so one job is leased to one worker at a time.
//! A worker that dies keeps its lease until `locked_until`; after that the job
//! is claimable again (at-least-once delivery). Each claim writes a fresh
//! `lease_id` and settling requires it, so a worker whose lease expired
//! cannot ack, requeue or bury a job someone else now holds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::types::{millis_to_datetime, JobRow};
use super::{DbPool, DeadLetter, JobArgs, JobStatus, NackOutcome, QueuedJob};
use crate::error::AppResult;
use crate::traits::QueueTransport;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

#[derive(Clone)]
pub struct SqliteQueue {
    pool: DbPool,
    max_attempts: u32,
}

impl SqliteQueue {
    pub fn new(pool: DbPool, max_attempts: u32) -> Self {
        Self {
            pool,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Jobs waiting or in flight on `queue`. Dead letters are not counted.
    pub async fn queue_depth(&self, queue: &str) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND status != 'dead'")
                .bind(queue)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn dead_letters(&self, queue: &str) -> AppResult<Vec<DeadLetter>> {
        let rows: Vec<(String, String, String, i64, Option<String>)> = sqlx::query_as(
            "SELECT job_id, job_type, args, attempts, last_error
             FROM jobs WHERE queue = ? AND status = 'dead'
             ORDER BY created_at ASC",
        )
        .bind(queue)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, job_type, args, attempts, last_error)| {
                Ok(DeadLetter {
                    id,
                    job_type,
                    args: serde_json::from_str(&args)?,
                    attempts: attempts.max(0) as u32,
                    last_error,
                })
            })
            .collect()
    }

    async fn bury_exhausted_leases(&self, queue: &str, now: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'dead', locked_until = NULL,
                 last_error = COALESCE(last_error, 'lease expired')
             WHERE queue = ? AND status = 'running' AND locked_until <= ?
               AND attempts >= max_attempts",
        )
        .bind(queue)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::warn!(
                queue,
                count = result.rows_affected(),
                "Expired leases with no attempts left moved to dead letters"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl QueueTransport for SqliteQueue {
    async fn enqueue(&self, queue: &str, job_type: &str, args: &JobArgs) -> AppResult<String> {
        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        let encoded = serde_json::to_string(args)?;

        sqlx::query(
            "INSERT INTO jobs (job_id, queue, job_type, args, status, attempts, max_attempts,
                               available_at, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(&job_id)
        .bind(queue)
        .bind(job_type)
        .bind(encoded)
        .bind(JobStatus::Queued)
        .bind(i64::from(self.max_attempts))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(queue, job_type, job_id = %job_id, "Job enqueued");
        Ok(job_id)
    }

    async fn claim(&self, queue: &str, lease: Duration) -> AppResult<Option<QueuedJob>> {
        let now = Utc::now().timestamp_millis();
        self.bury_exhausted_leases(queue, now).await?;

        let lease_ms = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE jobs
             SET status = 'running', attempts = attempts + 1, locked_until = ?, lease_id = ?
             WHERE job_id = (
                 SELECT job_id FROM jobs
                 WHERE queue = ?
                   AND ((status = 'queued' AND available_at <= ?)
                        OR (status = 'running' AND locked_until <= ?))
                 ORDER BY available_at ASC, created_at ASC
                 LIMIT 1
             )
             RETURNING job_id, lease_id, queue, job_type, args, attempts, max_attempts",
        )
        .bind(now.saturating_add(lease_ms))
        .bind(Uuid::new_v4().to_string())
        .bind(queue)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(QueuedJob {
            id: row.job_id,
            lease_id: row.lease_id,
            queue: row.queue,
            job_type: row.job_type,
            args: serde_json::from_str(&row.args)?,
            attempts: row.attempts.max(0) as u32,
            max_attempts: row.max_attempts.max(0) as u32,
        }))
    }

    async fn ack(&self, job: &QueuedJob) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE job_id = ? AND status = 'running' AND lease_id = ?",
        )
        .bind(&job.id)
        .bind(&job.lease_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(job_id = %job.id, "Ack skipped, lease lost");
            return Ok(false);
        }
        Ok(true)
    }

    async fn nack(
        &self,
        job: &QueuedJob,
        error: &str,
        retry_in: Duration,
    ) -> AppResult<NackOutcome> {
        let retry_ms = i64::try_from(retry_in.as_millis()).unwrap_or(i64::MAX);
        let available_at = Utc::now().timestamp_millis().saturating_add(retry_ms);

        let row: Option<(JobStatus, i64)> = sqlx::query_as(
            "UPDATE jobs
             SET status = CASE WHEN attempts >= max_attempts THEN 'dead' ELSE 'queued' END,
                 available_at = ?, locked_until = NULL, lease_id = NULL, last_error = ?
             WHERE job_id = ? AND status = 'running' AND lease_id = ?
             RETURNING status, available_at",
        )
        .bind(available_at)
        .bind(error)
        .bind(&job.id)
        .bind(&job.lease_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((JobStatus::Dead, _)) => Ok(NackOutcome::DeadLettered),
            Some((_, available_at)) => Ok(NackOutcome::Retrying {
                available_at: millis_to_datetime(available_at),
            }),
            None => {
                tracing::warn!(job_id = %job.id, "Nack skipped, lease lost");
                Ok(NackOutcome::LeaseLost)
            }
        }
    }

    async fn dead_letter(&self, job: &QueuedJob, error: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'dead', locked_until = NULL, lease_id = NULL, last_error = ?
             WHERE job_id = ? AND status = 'running' AND lease_id = ?",
        )
        .bind(error)
        .bind(&job.id)
        .bind(&job.lease_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(job_id = %job.id, "Dead-letter skipped, lease lost");
            return Ok(false);
        }
        Ok(true)
    }

    async fn has_pending(&self, queue: &str, job_type: &str, args: &JobArgs) -> AppResult<bool> {
        let encoded = serde_json::to_string(args)?;
        let pending: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM jobs
                 WHERE queue = ? AND job_type = ? AND args = ?
                   AND status IN ('queued', 'running')
             )",
        )
        .bind(queue)
        .bind(job_type)
        .bind(encoded)
        .fetch_one(&self.pool)
        .await?;
        Ok(pending != 0)
    }
}
