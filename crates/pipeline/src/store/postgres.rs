//! Postgres-backed store and queue, delegating to the `mockup-db`
//! repositories.

use std::time::Duration;

use async_trait::async_trait;
use mockup_core::signature::ThoughtSignatures;
use mockup_core::types::DbId;
use mockup_db::models::generation::{Generation, NewGeneration};
use mockup_db::models::image::{GeneratedImage, NewGeneratedImage};
use mockup_db::models::project::{IpCharacter, Project};
use mockup_db::models::queue::{EnqueueOptions, GenerationJobRow};
use mockup_db::repositories::{
    CharacterRepo, GenerationJobRepo, GenerationRepo, ImageRepo, ProjectRepo, SignatureRepo,
};
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::ports::{GenerationStore, JobQueue};
use crate::queue::{GenerationJob, QueuedJob, RetryPolicy};

/// Entries claimed longer ago than this are assumed abandoned.
const STALE_CLAIM_SECS: i64 = 15 * 60;

#[derive(Clone)]
pub struct PgGenerationStore {
    pool: PgPool,
}

impl PgGenerationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn create_generation(&self, input: &NewGeneration) -> Result<Generation, PipelineError> {
        Ok(GenerationRepo::create(&self.pool, input).await?)
    }

    async fn find_generation(&self, id: DbId) -> Result<Option<Generation>, PipelineError> {
        Ok(GenerationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn mark_processing(&self, id: DbId) -> Result<bool, PipelineError> {
        Ok(GenerationRepo::mark_processing(&self.pool, id).await?)
    }

    async fn mark_completed(&self, id: DbId) -> Result<bool, PipelineError> {
        Ok(GenerationRepo::mark_completed(&self.pool, id).await?)
    }

    async fn mark_failed(&self, id: DbId, error: &str) -> Result<bool, PipelineError> {
        Ok(GenerationRepo::mark_failed(&self.pool, id, error).await?)
    }

    async fn record_attempt_error(&self, id: DbId, error: &str) -> Result<bool, PipelineError> {
        Ok(GenerationRepo::record_attempt_error(&self.pool, id, error).await?)
    }

    async fn add_image(
        &self,
        generation_id: DbId,
        image: &NewGeneratedImage,
    ) -> Result<GeneratedImage, PipelineError> {
        Ok(ImageRepo::create(&self.pool, generation_id, image).await?)
    }

    async fn list_images(&self, generation_id: DbId) -> Result<Vec<GeneratedImage>, PipelineError> {
        Ok(ImageRepo::list_for_generation(&self.pool, generation_id).await?)
    }

    async fn select_image(
        &self,
        generation_id: DbId,
        image_id: DbId,
    ) -> Result<Option<GeneratedImage>, PipelineError> {
        Ok(ImageRepo::select(&self.pool, generation_id, image_id).await?)
    }

    async fn selected_images(
        &self,
        generation_ids: &[DbId],
    ) -> Result<Vec<GeneratedImage>, PipelineError> {
        Ok(ImageRepo::list_selected_for_generations(&self.pool, generation_ids).await?)
    }

    async fn append_signatures(
        &self,
        generation_id: DbId,
        signatures: &ThoughtSignatures,
    ) -> Result<i32, PipelineError> {
        let row = SignatureRepo::append(&self.pool, generation_id, signatures).await?;
        Ok(row.turn_index)
    }

    async fn list_signatures(
        &self,
        generation_id: DbId,
    ) -> Result<Vec<ThoughtSignatures>, PipelineError> {
        let rows = SignatureRepo::list_for_generation(&self.pool, generation_id).await?;
        Ok(rows.into_iter().map(ThoughtSignatures::from).collect())
    }

    async fn find_owned_project(
        &self,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Project>, PipelineError> {
        Ok(ProjectRepo::find_owned(&self.pool, project_id, user_id).await?)
    }

    async fn find_character(
        &self,
        character_id: DbId,
        project_id: DbId,
    ) -> Result<Option<IpCharacter>, PipelineError> {
        Ok(CharacterRepo::find_in_project(&self.pool, character_id, project_id).await?)
    }

    async fn list_completed(
        &self,
        project_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Generation>, PipelineError> {
        Ok(GenerationRepo::list_completed_for_project(&self.pool, project_id, limit, offset).await?)
    }

    async fn count_completed(&self, project_id: DbId) -> Result<i64, PipelineError> {
        Ok(GenerationRepo::count_completed_for_project(&self.pool, project_id).await?)
    }
}

/// Durable queue on the `generation_jobs` table.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
    policy: RetryPolicy,
}

impl PgJobQueue {
    pub fn new(pool: PgPool, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    fn to_queued(row: GenerationJobRow) -> Result<QueuedJob, PipelineError> {
        let job: GenerationJob = serde_json::from_value(row.payload).map_err(|e| {
            PipelineError::Internal(format!("Queue entry {} has a malformed payload: {e}", row.id))
        })?;
        Ok(QueuedJob {
            id: row.id,
            job,
            attempt: u32::try_from(row.attempts_made).unwrap_or(0),
            max_attempts: u32::try_from(row.max_attempts).unwrap_or(1),
        })
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: &GenerationJob) -> Result<DbId, PipelineError> {
        let payload = serde_json::to_value(job)
            .map_err(|e| PipelineError::Internal(format!("Failed to encode job: {e}")))?;
        let options = EnqueueOptions {
            priority: self.policy.priority,
            max_attempts: self.policy.max_attempts as i32,
            backoff_base_ms: self.policy.backoff_base.as_millis() as i64,
        };
        let row = GenerationJobRepo::enqueue(&self.pool, job.generation_id, &payload, options).await?;
        Ok(row.id)
    }

    async fn claim_next(&self) -> Result<Option<QueuedJob>, PipelineError> {
        let Some(row) = GenerationJobRepo::claim_next(&self.pool).await? else {
            return Ok(None);
        };
        let id = row.id;
        match Self::to_queued(row) {
            Ok(queued) => Ok(Some(queued)),
            Err(e) => {
                // An undecodable payload can never succeed.
                GenerationJobRepo::fail(&self.pool, id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn complete(&self, id: DbId) -> Result<(), PipelineError> {
        Ok(GenerationJobRepo::complete(&self.pool, id).await?)
    }

    async fn retry_later(&self, id: DbId, error: &str, delay: Duration) -> Result<(), PipelineError> {
        Ok(GenerationJobRepo::reschedule(&self.pool, id, error, delay.as_millis() as i64).await?)
    }

    async fn fail(&self, id: DbId, error: &str) -> Result<(), PipelineError> {
        Ok(GenerationJobRepo::fail(&self.pool, id, error).await?)
    }

    async fn housekeeping(&self) -> Result<(), PipelineError> {
        let recovered = GenerationJobRepo::recover_stale(&self.pool, STALE_CLAIM_SECS).await?;
        let pruned = GenerationJobRepo::prune(
            &self.pool,
            i64::from(self.policy.keep_completed),
            i64::from(self.policy.keep_failed),
        )
        .await?;
        if recovered > 0 || pruned > 0 {
            tracing::info!(recovered, pruned, "Queue housekeeping");
        }
        Ok(())
    }
}
