//! Repository for the `generations` table.
//!
//! Every status write is a conditional `UPDATE ... WHERE status_id = ANY(..)`
//! built from [`GenerationStatus::allowed_predecessors`], so a stale or
//! duplicate writer can never move a request backwards. Each method returns
//! whether the row actually changed.

use mockup_core::error::CoreError;
use mockup_core::types::DbId;
use sqlx::PgPool;

use crate::models::generation::{Generation, NewGeneration};
use crate::models::status::GenerationStatus;

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, project_id, owner_id, character_id, mode, status_id, \
    prompt_data, options, parent_generation_id, error_message, \
    created_at, updated_at, completed_at";

/// Provides persistence for generation requests.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new request in `pending`.
    pub async fn create(pool: &PgPool, input: &NewGeneration) -> Result<Generation, sqlx::Error> {
        let prompt_data = to_json(&input.inputs)?;
        let options = to_json(&input.options)?;

        let query = format!(
            "INSERT INTO generations \
                (project_id, owner_id, character_id, mode, status_id, prompt_data, options, parent_generation_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(input.project_id)
            .bind(input.owner_id)
            .bind(input.character_id)
            .bind(input.mode.as_str())
            .bind(GenerationStatus::Pending.id())
            .bind(&prompt_data)
            .bind(&options)
            .bind(input.parent_generation_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// `pending|processing -> processing`.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($3)",
        )
        .bind(id)
        .bind(GenerationStatus::Processing.id())
        .bind(GenerationStatus::Processing.allowed_predecessors())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `processing -> completed`, stamping `completed_at` and clearing any
    /// error left by an earlier attempt.
    pub async fn mark_completed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, error_message = NULL, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($3)",
        )
        .bind(id)
        .bind(GenerationStatus::Completed.id())
        .bind(GenerationStatus::Completed.allowed_predecessors())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `pending|processing -> failed`, stamping `completed_at`.
    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, error_message = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($4)",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.id())
        .bind(error)
        .bind(GenerationStatus::Failed.allowed_predecessors())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record the error of a retryable attempt without leaving `processing`.
    pub async fn record_attempt_error(
        pool: &PgPool,
        id: DbId,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET error_message = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(error)
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Completed generations of a project, newest first.
    pub async fn list_completed_for_project(
        pool: &PgPool,
        project_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE project_id = $1 AND status_id = $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(project_id)
            .bind(GenerationStatus::Completed.id())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_completed_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM generations WHERE project_id = $1 AND status_id = $2",
        )
        .bind(project_id)
        .bind(GenerationStatus::Completed.id())
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value)
        .map_err(|e| sqlx::Error::Encode(Box::new(CoreError::Internal(e.to_string()))))
}
