//! In-memory store and queue.
//!
//! Enforce the same status transition table as the Postgres repositories, so
//! pipeline tests exercise the real state machine without a database.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mockup_core::signature::ThoughtSignatures;
use mockup_core::types::DbId;
use mockup_db::models::generation::{Generation, NewGeneration};
use mockup_db::models::image::{GeneratedImage, NewGeneratedImage};
use mockup_db::models::project::{IpCharacter, Project};
use mockup_db::models::status::{GenerationStatus, QueueJobStatus};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::PipelineError;
use crate::ports::{GenerationStore, JobQueue};
use crate::queue::{GenerationJob, QueuedJob, RetryPolicy};

// ---------------------------------------------------------------------------
// Generation store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    next_id: DbId,
    projects: HashMap<DbId, Project>,
    characters: HashMap<DbId, IpCharacter>,
    generations: HashMap<DbId, Generation>,
    images: Vec<GeneratedImage>,
    signatures: HashMap<DbId, Vec<ThoughtSignatures>>,
}

impl StoreState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn transition(
        &mut self,
        id: DbId,
        next: GenerationStatus,
        error: Option<&str>,
    ) -> Result<bool, PipelineError> {
        let Some(row) = self.generations.get_mut(&id) else {
            return Ok(false);
        };
        let current = row.status()?;
        if !current.can_transition_to(next) {
            return Ok(false);
        }
        let now = Utc::now();
        row.status_id = next.id();
        row.updated_at = now;
        match next {
            GenerationStatus::Completed => {
                row.error_message = None;
                row.completed_at = Some(now);
            }
            GenerationStatus::Failed => {
                row.error_message = error.map(str::to_string);
                row.completed_at = Some(now);
            }
            _ => {}
        }
        Ok(true)
    }
}

/// A [`GenerationStore`] held in process memory.
#[derive(Default)]
pub struct MemoryGenerationStore {
    state: Mutex<StoreState>,
}

impl MemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_project(&self, user_id: DbId, name: &str) -> Project {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let project = Project {
            id: state.next_id(),
            user_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.projects.insert(project.id, project.clone());
        project
    }

    pub async fn insert_character(&self, project_id: DbId, name: &str, file_path: &str) -> IpCharacter {
        let mut state = self.state.lock().await;
        let character = IpCharacter {
            id: state.next_id(),
            project_id,
            name: name.to_string(),
            file_path: file_path.to_string(),
            created_at: Utc::now(),
        };
        state.characters.insert(character.id, character.clone());
        character
    }

    /// Force a status, bypassing the transition table. Test setup only.
    pub async fn force_status(&self, id: DbId, status: GenerationStatus) {
        let mut state = self.state.lock().await;
        if let Some(row) = state.generations.get_mut(&id) {
            row.status_id = status.id();
            row.completed_at = status.is_terminal().then(Utc::now);
        }
    }
}

#[async_trait]
impl GenerationStore for MemoryGenerationStore {
    async fn create_generation(&self, input: &NewGeneration) -> Result<Generation, PipelineError> {
        let prompt_data = serde_json::to_value(&input.inputs)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let options = serde_json::to_value(&input.options)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        let mut state = self.state.lock().await;
        let now = Utc::now();
        let row = Generation {
            id: state.next_id(),
            project_id: input.project_id,
            owner_id: input.owner_id,
            character_id: input.character_id,
            mode: input.mode.as_str().to_string(),
            status_id: GenerationStatus::Pending.id(),
            prompt_data,
            options,
            parent_generation_id: input.parent_generation_id,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        state.generations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_generation(&self, id: DbId) -> Result<Option<Generation>, PipelineError> {
        Ok(self.state.lock().await.generations.get(&id).cloned())
    }

    async fn mark_processing(&self, id: DbId) -> Result<bool, PipelineError> {
        self.state.lock().await.transition(id, GenerationStatus::Processing, None)
    }

    async fn mark_completed(&self, id: DbId) -> Result<bool, PipelineError> {
        self.state.lock().await.transition(id, GenerationStatus::Completed, None)
    }

    async fn mark_failed(&self, id: DbId, error: &str) -> Result<bool, PipelineError> {
        self.state.lock().await.transition(id, GenerationStatus::Failed, Some(error))
    }

    async fn record_attempt_error(&self, id: DbId, error: &str) -> Result<bool, PipelineError> {
        let mut state = self.state.lock().await;
        match state.generations.get_mut(&id) {
            Some(row) if row.status_id == GenerationStatus::Processing.id() => {
                row.error_message = Some(error.to_string());
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn add_image(
        &self,
        generation_id: DbId,
        image: &NewGeneratedImage,
    ) -> Result<GeneratedImage, PipelineError> {
        let mut state = self.state.lock().await;
        let row = GeneratedImage {
            id: state.next_id(),
            generation_id,
            file_path: image.file_path.clone(),
            thumbnail_path: image.thumbnail_path.clone(),
            is_selected: false,
            width: image.width,
            height: image.height,
            file_size: image.file_size,
            signature_turn: image.signature_turn,
            signature_slot: image.signature_slot,
            created_at: Utc::now(),
        };
        state.images.push(row.clone());
        Ok(row)
    }

    async fn list_images(&self, generation_id: DbId) -> Result<Vec<GeneratedImage>, PipelineError> {
        let state = self.state.lock().await;
        Ok(state
            .images
            .iter()
            .filter(|i| i.generation_id == generation_id)
            .cloned()
            .collect())
    }

    async fn select_image(
        &self,
        generation_id: DbId,
        image_id: DbId,
    ) -> Result<Option<GeneratedImage>, PipelineError> {
        let mut state = self.state.lock().await;
        let owned = state
            .images
            .iter()
            .any(|i| i.id == image_id && i.generation_id == generation_id);
        if !owned {
            return Ok(None);
        }

        let mut selected = None;
        for image in state.images.iter_mut().filter(|i| i.generation_id == generation_id) {
            image.is_selected = image.id == image_id;
            if image.is_selected {
                selected = Some(image.clone());
            }
        }
        Ok(selected)
    }

    async fn selected_images(
        &self,
        generation_ids: &[DbId],
    ) -> Result<Vec<GeneratedImage>, PipelineError> {
        let state = self.state.lock().await;
        Ok(state
            .images
            .iter()
            .filter(|i| i.is_selected && generation_ids.contains(&i.generation_id))
            .cloned()
            .collect())
    }

    async fn append_signatures(
        &self,
        generation_id: DbId,
        signatures: &ThoughtSignatures,
    ) -> Result<i32, PipelineError> {
        let mut state = self.state.lock().await;
        let turns = state.signatures.entry(generation_id).or_default();
        turns.push(signatures.clone());
        Ok(turns.len() as i32 - 1)
    }

    async fn list_signatures(
        &self,
        generation_id: DbId,
    ) -> Result<Vec<ThoughtSignatures>, PipelineError> {
        Ok(self
            .state
            .lock()
            .await
            .signatures
            .get(&generation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_owned_project(
        &self,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Project>, PipelineError> {
        let state = self.state.lock().await;
        Ok(state
            .projects
            .get(&project_id)
            .filter(|p| p.user_id == user_id)
            .cloned())
    }

    async fn find_character(
        &self,
        character_id: DbId,
        project_id: DbId,
    ) -> Result<Option<IpCharacter>, PipelineError> {
        let state = self.state.lock().await;
        Ok(state
            .characters
            .get(&character_id)
            .filter(|c| c.project_id == project_id)
            .cloned())
    }

    async fn list_completed(
        &self,
        project_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Generation>, PipelineError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Generation> = state
            .generations
            .values()
            .filter(|g| g.project_id == project_id && g.status_id == GenerationStatus::Completed.id())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_completed(&self, project_id: DbId) -> Result<i64, PipelineError> {
        let state = self.state.lock().await;
        Ok(state
            .generations
            .values()
            .filter(|g| g.project_id == project_id && g.status_id == GenerationStatus::Completed.id())
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// Job queue
// ---------------------------------------------------------------------------

/// Snapshot of an in-memory queue entry.
#[derive(Debug, Clone)]
pub struct MemoryQueueEntry {
    pub id: DbId,
    pub job: GenerationJob,
    pub status: QueueJobStatus,
    pub attempts_made: u32,
    pub last_error: Option<String>,
    run_after: Instant,
}

/// A [`JobQueue`] held in process memory.
pub struct MemoryJobQueue {
    policy: RetryPolicy,
    entries: Mutex<Vec<MemoryQueueEntry>>,
}

impl MemoryJobQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub async fn entries(&self) -> Vec<MemoryQueueEntry> {
        self.entries.lock().await.clone()
    }

    async fn update(
        &self,
        id: DbId,
        apply: impl FnOnce(&mut MemoryQueueEntry),
    ) -> Result<(), PipelineError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(PipelineError::NotFound { entity: "QueueEntry", id })?;
        apply(entry);
        Ok(())
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &GenerationJob) -> Result<DbId, PipelineError> {
        let mut entries = self.entries.lock().await;
        let id = entries.len() as DbId + 1;
        entries.push(MemoryQueueEntry {
            id,
            job: job.clone(),
            status: QueueJobStatus::Queued,
            attempts_made: 0,
            last_error: None,
            run_after: Instant::now(),
        });
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<QueuedJob>, PipelineError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.status == QueueJobStatus::Queued && e.run_after <= now)
        else {
            return Ok(None);
        };
        entry.status = QueueJobStatus::Active;
        entry.attempts_made += 1;
        Ok(Some(QueuedJob {
            id: entry.id,
            job: entry.job.clone(),
            attempt: entry.attempts_made,
            max_attempts: self.policy.max_attempts,
        }))
    }

    async fn complete(&self, id: DbId) -> Result<(), PipelineError> {
        self.update(id, |e| e.status = QueueJobStatus::Completed).await
    }

    async fn retry_later(&self, id: DbId, error: &str, delay: Duration) -> Result<(), PipelineError> {
        self.update(id, |e| {
            e.status = QueueJobStatus::Queued;
            e.last_error = Some(error.to_string());
            e.run_after = Instant::now() + delay;
        })
        .await
    }

    async fn fail(&self, id: DbId, error: &str) -> Result<(), PipelineError> {
        self.update(id, |e| {
            e.status = QueueJobStatus::Failed;
            e.last_error = Some(error.to_string());
        })
        .await
    }

    async fn housekeeping(&self) -> Result<(), PipelineError> {
        let mut entries = self.entries.lock().await;
        for (status, keep) in [
            (QueueJobStatus::Completed, self.policy.keep_completed as usize),
            (QueueJobStatus::Failed, self.policy.keep_failed as usize),
        ] {
            let finished = entries.iter().filter(|e| e.status == status).count();
            let mut excess = finished.saturating_sub(keep);
            // Oldest entries come first.
            entries.retain(|e| {
                if excess > 0 && e.status == status {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }
        Ok(())
    }
}
