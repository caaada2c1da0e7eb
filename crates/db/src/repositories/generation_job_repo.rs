//! Repository for the durable `generation_jobs` queue.
//!
//! Delivery is at-least-once: an entry is `queued` until a worker claims it,
//! `active` while it runs, then either rescheduled with backoff, `completed`
//! or `failed`. Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent workers
//! never receive the same entry.

use mockup_core::types::DbId;
use sqlx::PgPool;

use crate::models::queue::{EnqueueOptions, GenerationJobRow};
use crate::models::status::QueueJobStatus;

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, generation_id, payload, status_id, priority, attempts_made, \
    max_attempts, backoff_base_ms, run_after, last_error, claimed_at, \
    finished_at, created_at, updated_at";

/// Provides persistence for queued generation jobs.
pub struct GenerationJobRepo;

impl GenerationJobRepo {
    pub async fn enqueue(
        pool: &PgPool,
        generation_id: DbId,
        payload: &serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<GenerationJobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_jobs \
                (generation_id, payload, status_id, priority, max_attempts, backoff_base_ms) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJobRow>(&query)
            .bind(generation_id)
            .bind(payload)
            .bind(QueueJobStatus::Queued.id())
            .bind(options.priority)
            .bind(options.max_attempts)
            .bind(options.backoff_base_ms)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next due entry and count the attempt.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<GenerationJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_jobs \
             SET status_id = $1, attempts_made = attempts_made + 1, \
                 claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM generation_jobs \
                 WHERE status_id = $2 AND run_after <= NOW() \
                 ORDER BY priority DESC, run_after ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJobRow>(&query)
            .bind(QueueJobStatus::Active.id())
            .bind(QueueJobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(QueueJobStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Put an active entry back in the queue, due after `delay_ms`.
    pub async fn reschedule(
        pool: &PgPool,
        id: DbId,
        error: &str,
        delay_ms: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, last_error = $3, claimed_at = NULL, \
                 run_after = NOW() + ($4 * INTERVAL '1 millisecond'), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(QueueJobStatus::Queued.id())
        .bind(error)
        .bind(delay_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, last_error = $3, finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(QueueJobStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Keep only the newest `keep_completed` completed and `keep_failed`
    /// failed entries. Returns the number of rows deleted.
    pub async fn prune(
        pool: &PgPool,
        keep_completed: i64,
        keep_failed: i64,
    ) -> Result<u64, sqlx::Error> {
        let mut deleted = 0;
        for (status, keep) in [
            (QueueJobStatus::Completed, keep_completed),
            (QueueJobStatus::Failed, keep_failed),
        ] {
            let result = sqlx::query(
                "DELETE FROM generation_jobs \
                 WHERE status_id = $1 AND id NOT IN ( \
                     SELECT id FROM generation_jobs WHERE status_id = $1 \
                     ORDER BY finished_at DESC NULLS LAST, id DESC LIMIT $2 \
                 )",
            )
            .bind(status.id())
            .bind(keep)
            .execute(pool)
            .await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    /// Return entries left `active` for longer than `stale_after_secs`
    /// (a crashed worker) to the queue.
    pub async fn recover_stale(pool: &PgPool, stale_after_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $1, claimed_at = NULL, run_after = NOW(), updated_at = NOW() \
             WHERE status_id = $2 \
               AND claimed_at < NOW() - ($3 * INTERVAL '1 second')",
        )
        .bind(QueueJobStatus::Queued.id())
        .bind(QueueJobStatus::Active.id())
        .bind(stale_after_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<GenerationJobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, GenerationJobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
