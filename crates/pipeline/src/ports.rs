//! Collaborator traits.
//!
//! The dispatcher and the worker only see these traits, so production
//! (Postgres, local disk, Gemini) and test (in-memory, scripted) backends
//! are interchangeable behind `Arc<dyn ...>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockup_core::signature::ThoughtSignatures;
use mockup_core::types::DbId;
use mockup_core::upscale::UpscaleModel;
use mockup_db::models::generation::{Generation, NewGeneration};
use mockup_db::models::image::{GeneratedImage, NewGeneratedImage};
use mockup_db::models::project::{IpCharacter, Project};
use mockup_gemini::messages::Content;

use crate::error::PipelineError;
use crate::queue::{GenerationJob, QueuedJob};

/// Byte-level access to uploaded inputs and generated outputs.
///
/// Paths are relative to the storage root.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError>;

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError>;
}

/// One fully assembled provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub system_instruction: String,
    pub contents: Vec<Content>,
}

/// Images and continuation signatures produced by one provider call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub images: Vec<Vec<u8>>,
    pub signatures: ThoughtSignatures,
}

/// The external multi-modal image model.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, PipelineError>;
}

/// External super-resolution tool.
#[async_trait]
pub trait Upscaler: Send + Sync {
    /// Upscale `input` by `scale` and return the path of the written output.
    async fn upscale(
        &self,
        input: &Path,
        scale: u8,
        model: UpscaleModel,
    ) -> Result<PathBuf, PipelineError>;
}

/// Persistent generation state.
///
/// Status writers return `false` when the transition was not applied
/// because the request had already moved past it.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    async fn create_generation(&self, input: &NewGeneration) -> Result<Generation, PipelineError>;

    async fn find_generation(&self, id: DbId) -> Result<Option<Generation>, PipelineError>;

    async fn mark_processing(&self, id: DbId) -> Result<bool, PipelineError>;

    async fn mark_completed(&self, id: DbId) -> Result<bool, PipelineError>;

    async fn mark_failed(&self, id: DbId, error: &str) -> Result<bool, PipelineError>;

    async fn record_attempt_error(&self, id: DbId, error: &str) -> Result<bool, PipelineError>;

    async fn add_image(
        &self,
        generation_id: DbId,
        image: &NewGeneratedImage,
    ) -> Result<GeneratedImage, PipelineError>;

    /// Images in creation order.
    async fn list_images(&self, generation_id: DbId) -> Result<Vec<GeneratedImage>, PipelineError>;

    /// Make one image the only selected image. `None` if it is not part of
    /// the generation.
    async fn select_image(
        &self,
        generation_id: DbId,
        image_id: DbId,
    ) -> Result<Option<GeneratedImage>, PipelineError>;

    async fn selected_images(
        &self,
        generation_ids: &[DbId],
    ) -> Result<Vec<GeneratedImage>, PipelineError>;

    /// Record one response's signatures as the next turn. Returns the turn
    /// index, which counts up from 0 per generation.
    async fn append_signatures(
        &self,
        generation_id: DbId,
        signatures: &ThoughtSignatures,
    ) -> Result<i32, PipelineError>;

    /// Signature records indexed by turn.
    async fn list_signatures(
        &self,
        generation_id: DbId,
    ) -> Result<Vec<ThoughtSignatures>, PipelineError>;

    async fn find_owned_project(
        &self,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Project>, PipelineError>;

    async fn find_character(
        &self,
        character_id: DbId,
        project_id: DbId,
    ) -> Result<Option<IpCharacter>, PipelineError>;

    /// Completed generations of a project, newest first.
    async fn list_completed(
        &self,
        project_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Generation>, PipelineError>;

    async fn count_completed(&self, project_id: DbId) -> Result<i64, PipelineError>;
}

/// Durable at-least-once job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &GenerationJob) -> Result<DbId, PipelineError>;

    /// Claim the next due entry, counting the delivery attempt.
    async fn claim_next(&self) -> Result<Option<QueuedJob>, PipelineError>;

    async fn complete(&self, id: DbId) -> Result<(), PipelineError>;

    /// Deliver the entry again after `delay`.
    async fn retry_later(
        &self,
        id: DbId,
        error: &str,
        delay: std::time::Duration,
    ) -> Result<(), PipelineError>;

    /// Give up on the entry.
    async fn fail(&self, id: DbId, error: &str) -> Result<(), PipelineError>;

    /// Apply retention and requeue entries abandoned by a crashed worker.
    async fn housekeeping(&self) -> Result<(), PipelineError>;
}
