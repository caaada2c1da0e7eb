//! Job Dispatcher: validates requests, persists them and enqueues work.
//!
//! Every entry point checks ownership first. Requests that reference
//! another user's project or generation are reported as not found.

use std::sync::Arc;

use mockup_core::generation::{
    validate_edit_prompt, validate_inputs, validate_prompt, EditInputs, GenerationInputs,
    GenerationMode,
};
use mockup_core::options::{GenerationOptions, RawGenerationOptions};
use mockup_core::types::DbId;
use mockup_db::models::generation::{Generation, NewGeneration};
use mockup_db::models::status::GenerationStatus;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::ports::{GenerationStore, JobQueue};
use crate::queue::GenerationJob;
use crate::views::{GenerationView, HistoryItem, HistoryPage, ImageView, Pagination};

/// A new generation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeneration {
    pub project_id: DbId,
    pub mode: GenerationMode,
    #[serde(default)]
    pub source_image_path: Option<String>,
    #[serde(default)]
    pub character_id: Option<DbId>,
    /// Takes precedence over `character_id` when both are given.
    #[serde(default)]
    pub character_image_path: Option<String>,
    #[serde(default)]
    pub texture_image_path: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Canonical or legacy options; migrated on submit.
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// Style-copy request: reuse a completed generation with a new character.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleCopyRequest {
    #[serde(default)]
    pub character_id: Option<DbId>,
    #[serde(default)]
    pub character_image_path: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Partial edit of a generation's selected image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub prompt: String,
}

pub struct JobDispatcher {
    store: Arc<dyn GenerationStore>,
    queue: Arc<dyn JobQueue>,
}

impl JobDispatcher {
    pub fn new(store: Arc<dyn GenerationStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Validate, persist as `pending`, enqueue.
    pub async fn submit(&self, owner_id: DbId, request: CreateGeneration) -> Result<Generation, PipelineError> {
        let options = GenerationOptions::from_json(
            request.options.unwrap_or_else(|| serde_json::json!({})),
        )?;
        validate_prompt(request.prompt.as_deref())?;
        self.require_project(request.project_id, owner_id).await?;

        let character_image_path = match (request.character_image_path, request.character_id) {
            (Some(path), _) => Some(path),
            (None, Some(character_id)) => Some(
                self.resolve_character_path(character_id, request.project_id)
                    .await?,
            ),
            (None, None) => None,
        };

        let inputs = GenerationInputs {
            source_image_path: request.source_image_path,
            character_image_path,
            texture_image_path: request.texture_image_path,
            user_prompt: request.prompt,
            edit: None,
        };

        self.persist_and_enqueue(NewGeneration {
            project_id: request.project_id,
            owner_id,
            character_id: request.character_id,
            mode: request.mode,
            inputs,
            options,
            parent_generation_id: None,
        })
        .await
    }

    /// New request from a previous one's stored inputs and options. Only the
    /// overridden option fields differ; the original is left untouched.
    pub async fn regenerate(
        &self,
        owner_id: DbId,
        generation_id: DbId,
        overrides: RawGenerationOptions,
    ) -> Result<Generation, PipelineError> {
        let original = self.require_generation(generation_id, owner_id).await?;
        let options = original.options()?.with_overrides(overrides)?;

        self.persist_and_enqueue(NewGeneration {
            project_id: original.project_id,
            owner_id,
            character_id: original.character_id,
            mode: original.mode()?,
            inputs: original.inputs()?,
            options,
            parent_generation_id: original.parent_generation_id,
        })
        .await
    }

    /// New request continuing a completed parent with a different character.
    ///
    /// Rejected before anything is enqueued when the parent is not
    /// completed or has no continuation signatures.
    pub async fn style_copy(
        &self,
        owner_id: DbId,
        parent_id: DbId,
        request: StyleCopyRequest,
    ) -> Result<Generation, PipelineError> {
        let parent = self.require_generation(parent_id, owner_id).await?;

        let status = parent.status()?;
        if status != GenerationStatus::Completed {
            return Err(PipelineError::Validation(format!(
                "Style copy requires a completed generation (generation {parent_id} is {status})"
            )));
        }
        if self.store.list_signatures(parent_id).await?.is_empty() {
            return Err(PipelineError::MissingParentArtifact(format!(
                "Generation {parent_id} has no continuation signatures"
            )));
        }
        validate_prompt(request.prompt.as_deref())?;

        let character_image_path = match (request.character_image_path, request.character_id) {
            (Some(path), _) => path,
            (None, Some(character_id)) => {
                self.resolve_character_path(character_id, parent.project_id)
                    .await?
            }
            (None, None) => {
                return Err(PipelineError::Validation(
                    "Style copy requires a character".to_string(),
                ));
            }
        };

        let parent_inputs = parent.inputs()?;
        let inputs = GenerationInputs {
            source_image_path: parent_inputs.source_image_path,
            character_image_path: Some(character_image_path),
            texture_image_path: parent_inputs.texture_image_path,
            user_prompt: request.prompt.or(parent_inputs.user_prompt),
            edit: None,
        };
        let options = GenerationOptions {
            style_copy: true,
            ..parent.options()?
        };

        self.persist_and_enqueue(NewGeneration {
            project_id: parent.project_id,
            owner_id,
            character_id: request.character_id,
            mode: parent.mode()?,
            inputs,
            options,
            parent_generation_id: Some(parent_id),
        })
        .await
    }

    /// New request that modifies only part of `generation_id`'s selected
    /// image. The child keeps the original's project, character, mode,
    /// inputs and options.
    pub async fn edit(
        &self,
        owner_id: DbId,
        generation_id: DbId,
        request: EditRequest,
    ) -> Result<Generation, PipelineError> {
        let edit_prompt = validate_edit_prompt(&request.prompt)?;
        let original = self.require_generation(generation_id, owner_id).await?;

        let selected = self
            .store
            .list_images(generation_id)
            .await?
            .into_iter()
            .find(|i| i.is_selected)
            .ok_or(PipelineError::NoSelectedImage(generation_id))?;

        let inputs = GenerationInputs {
            edit: Some(EditInputs {
                source_generation_id: generation_id,
                image_path: selected.file_path,
                edit_prompt,
            }),
            ..original.inputs()?
        };

        self.persist_and_enqueue(NewGeneration {
            project_id: original.project_id,
            owner_id,
            character_id: original.character_id,
            mode: original.mode()?,
            inputs,
            options: original.options()?,
            parent_generation_id: None,
        })
        .await
    }

    /// Current status, options and images of a request.
    pub async fn status(&self, owner_id: DbId, generation_id: DbId) -> Result<GenerationView, PipelineError> {
        let generation = self.require_generation(generation_id, owner_id).await?;
        let images = self.store.list_images(generation_id).await?;
        GenerationView::build(generation, images)
    }

    /// Make `image_id` the only selected image of a request.
    pub async fn select_image(
        &self,
        owner_id: DbId,
        generation_id: DbId,
        image_id: DbId,
    ) -> Result<ImageView, PipelineError> {
        self.require_generation(generation_id, owner_id).await?;
        self.store
            .select_image(generation_id, image_id)
            .await?
            .map(ImageView::from)
            .ok_or(PipelineError::NotFound {
                entity: "GeneratedImage",
                id: image_id,
            })
    }

    /// Completed requests of a project, newest first, with their selected
    /// image.
    pub async fn project_history(
        &self,
        owner_id: DbId,
        project_id: DbId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<HistoryPage, PipelineError> {
        self.require_project(project_id, owner_id).await?;

        let (page, limit) = Pagination::normalize(page, limit);
        let total = self.store.count_completed(project_id).await?;
        let pagination = Pagination::new(page, limit, total);
        let generations = self
            .store
            .list_completed(project_id, i64::from(limit), pagination.offset())
            .await?;

        let ids: Vec<DbId> = generations.iter().map(|g| g.id).collect();
        let mut selected = self.store.selected_images(&ids).await?;

        let mut items = Vec::with_capacity(generations.len());
        for generation in generations {
            let selected_image = selected
                .iter()
                .position(|i| i.generation_id == generation.id)
                .map(|pos| ImageView::from(selected.swap_remove(pos)));
            items.push(HistoryItem {
                id: generation.id,
                mode: generation.mode()?,
                character_id: generation.character_id,
                created_at: generation.created_at,
                selected_image,
            });
        }

        Ok(HistoryPage { items, pagination })
    }

    // ---- private helpers ----

    async fn require_project(&self, project_id: DbId, owner_id: DbId) -> Result<(), PipelineError> {
        self.store
            .find_owned_project(project_id, owner_id)
            .await?
            .map(|_| ())
            .ok_or(PipelineError::NotFound {
                entity: "Project",
                id: project_id,
            })
    }

    async fn require_generation(&self, generation_id: DbId, owner_id: DbId) -> Result<Generation, PipelineError> {
        self.store
            .find_generation(generation_id)
            .await?
            .filter(|g| g.owner_id == owner_id)
            .ok_or(PipelineError::NotFound {
                entity: "Generation",
                id: generation_id,
            })
    }

    async fn resolve_character_path(&self, character_id: DbId, project_id: DbId) -> Result<String, PipelineError> {
        self.store
            .find_character(character_id, project_id)
            .await?
            .map(|c| c.file_path)
            .ok_or(PipelineError::NotFound {
                entity: "IpCharacter",
                id: character_id,
            })
    }

    async fn persist_and_enqueue(&self, input: NewGeneration) -> Result<Generation, PipelineError> {
        validate_inputs(input.mode, &input.inputs)?;

        let generation = self.store.create_generation(&input).await?;
        let job = GenerationJob {
            generation_id: generation.id,
            owner_id: input.owner_id,
            project_id: input.project_id,
            mode: input.mode,
            source_image_path: input.inputs.source_image_path,
            character_image_path: input.inputs.character_image_path,
            texture_image_path: input.inputs.texture_image_path,
            prompt: input.inputs.user_prompt,
            parent_generation_id: input.parent_generation_id,
            edit: input.inputs.edit,
            options: input.options,
        };

        match self.queue.enqueue(&job).await {
            Ok(queue_id) => {
                tracing::info!(
                    generation_id = generation.id,
                    queue_id,
                    mode = %job.mode,
                    parent_generation_id = ?job.parent_generation_id,
                    edit = job.edit.is_some(),
                    "Generation enqueued",
                );
                Ok(generation)
            }
            Err(e) => {
                tracing::error!(generation_id = generation.id, error = %e, "Failed to enqueue generation");
                self.store
                    .mark_failed(generation.id, "Failed to enqueue generation")
                    .await?;
                Err(e)
            }
        }
    }
}
