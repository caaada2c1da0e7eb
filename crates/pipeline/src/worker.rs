//! Generation Worker and the bounded pool that drives it.

use std::sync::Arc;
use std::time::Duration;

use mockup_core::generation::{
    output_dir, output_file_name, thumbnail_file_name, validate_inputs, EditInputs, GenerationMode,
};
use mockup_core::system_prompt::{
    edit_system_prompt, ip_change_system_prompt, sketch_to_real_system_prompt,
    style_copy_system_prompt,
};
use mockup_core::types::DbId;
use mockup_db::models::image::NewGeneratedImage;
use tokio_util::sync::CancellationToken;

use crate::adapter::{
    edit_parts, ip_change_parts, sketch_to_real_parts, style_copy_parts, GenerationAdapter,
    GenerationOutput,
};
use crate::continuation::{build_conversation, load_parent_artifact};
use crate::error::PipelineError;
use crate::ports::{FileStorage, GenerationStore, JobQueue};
use crate::queue::{GenerationJob, QueuedJob, RetryPolicy};

/// What processing a delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The request reached `completed` with this many images.
    Completed { images: usize },
    /// The request was already terminal; the delivery was a duplicate.
    Skipped,
}

/// Input image bytes loaded for one job.
struct LoadedInputs {
    source: Vec<u8>,
    character: Option<Vec<u8>>,
    texture: Option<Vec<u8>>,
}

/// Processes one queued job end to end.
pub struct GenerationWorker {
    store: Arc<dyn GenerationStore>,
    files: Arc<dyn FileStorage>,
    adapter: GenerationAdapter,
}

impl GenerationWorker {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        files: Arc<dyn FileStorage>,
        adapter: GenerationAdapter,
    ) -> Self {
        Self {
            store,
            files,
            adapter,
        }
    }

    /// Drive one delivery of `job` through the state machine.
    ///
    /// Errors are returned to the caller, which decides between retry and
    /// terminal failure.
    pub async fn process(
        &self,
        job: &GenerationJob,
        attempt: u32,
    ) -> Result<ProcessOutcome, PipelineError> {
        let id = job.generation_id;
        let generation = self
            .store
            .find_generation(id)
            .await?
            .ok_or(PipelineError::NotFound { entity: "Generation", id })?;

        if generation.status()?.is_terminal() {
            tracing::info!(generation_id = id, "Generation already finished, skipping delivery");
            return Ok(ProcessOutcome::Skipped);
        }
        if !self.store.mark_processing(id).await? {
            tracing::info!(generation_id = id, "Generation moved on concurrently, skipping delivery");
            return Ok(ProcessOutcome::Skipped);
        }

        tracing::info!(generation_id = id, attempt, mode = %job.mode, "Generation started");

        let inputs = job.inputs();
        validate_inputs(job.mode, &inputs)?;

        let output = match (&job.edit, job.parent_generation_id) {
            (Some(edit), _) => self.run_edit(job, edit).await?,
            (None, Some(parent_id)) => {
                let loaded = self.load_inputs(job).await?;
                self.run_continuation(job, parent_id, &loaded).await?
            }
            (None, None) => {
                let loaded = self.load_inputs(job).await?;
                self.run_stateless(job, &loaded).await?
            }
        };

        let saved = self.persist_output(job, attempt, &output).await?;

        if !self.store.mark_completed(id).await? {
            tracing::warn!(generation_id = id, "Generation was finalized elsewhere before completion");
        }
        tracing::info!(generation_id = id, images = saved, "Generation completed");

        Ok(ProcessOutcome::Completed { images: saved })
    }

    /// Run a claimed delivery under `timeout` and settle it with the queue.
    pub async fn handle(
        &self,
        queue: &dyn JobQueue,
        policy: &RetryPolicy,
        queued: QueuedJob,
        timeout: Duration,
    ) -> Result<(), PipelineError> {
        let generation_id = queued.job.generation_id;
        let result = match tokio::time::timeout(timeout, self.process(&queued.job, queued.attempt)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(timeout.as_secs())),
        };

        let error = match result {
            Ok(_) => return queue.complete(queued.id).await,
            Err(e) => e,
        };
        let message = error.to_string();

        if !error.is_retryable() || queued.is_last_attempt() {
            tracing::error!(
                generation_id,
                attempt = queued.attempt,
                error = %message,
                "Generation failed",
            );
            self.store.mark_failed(generation_id, &message).await?;
            queue.fail(queued.id, &message).await
        } else {
            let delay = policy.backoff_for(queued.attempt);
            tracing::warn!(
                generation_id,
                attempt = queued.attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %message,
                "Generation attempt failed, retrying",
            );
            self.store.record_attempt_error(generation_id, &message).await?;
            queue.retry_later(queued.id, &message, delay).await
        }
    }

    // ---- private helpers ----

    async fn load_inputs(&self, job: &GenerationJob) -> Result<LoadedInputs, PipelineError> {
        let source = match job.source_image_path.as_deref() {
            Some(path) => self.files.read(path).await?,
            None => {
                return Err(PipelineError::Validation("Source image is required".to_string()));
            }
        };
        let character = match job.character_image_path.as_deref() {
            Some(path) => Some(self.files.read(path).await?),
            None => None,
        };
        let texture = match job.texture_image_path.as_deref() {
            Some(path) => Some(self.files.read(path).await?),
            None => None,
        };
        Ok(LoadedInputs {
            source,
            character,
            texture,
        })
    }

    async fn run_stateless(
        &self,
        job: &GenerationJob,
        loaded: &LoadedInputs,
    ) -> Result<GenerationOutput, PipelineError> {
        let prompt = job.prompt.as_deref();
        let (system, parts) = match job.mode {
            GenerationMode::IpChange => {
                let character = require_character(loaded)?;
                (
                    ip_change_system_prompt(&job.options)?,
                    ip_change_parts(&loaded.source, character, prompt),
                )
            }
            GenerationMode::SketchToReal => (
                sketch_to_real_system_prompt(&job.options)?,
                sketch_to_real_parts(&loaded.source, loaded.texture.as_deref(), prompt),
            ),
        };

        self.adapter
            .generate_stateless(system, parts, job.options.effective_output_count())
            .await
    }

    async fn run_continuation(
        &self,
        job: &GenerationJob,
        parent_id: DbId,
        loaded: &LoadedInputs,
    ) -> Result<GenerationOutput, PipelineError> {
        let parent = load_parent_artifact(self.store.as_ref(), self.files.as_ref(), parent_id).await?;
        let character = require_character(loaded)?;

        let system = style_copy_system_prompt(&job.options)?;
        let parts = style_copy_parts(&loaded.source, character, job.prompt.as_deref());
        let contents = build_conversation(&parent, parts);

        tracing::debug!(
            generation_id = job.generation_id,
            parent_id,
            "Continuing parent conversation",
        );
        self.adapter.generate_multi_turn(system, contents).await
    }

    /// One call on the edited image. The image belongs to another request,
    /// so losing it is terminal.
    async fn run_edit(
        &self,
        job: &GenerationJob,
        edit: &EditInputs,
    ) -> Result<GenerationOutput, PipelineError> {
        let image = self.files.read(&edit.image_path).await.map_err(|e| {
            PipelineError::MissingParentArtifact(format!(
                "Image '{}' to edit could not be read: {e}",
                edit.image_path
            ))
        })?;

        tracing::debug!(
            generation_id = job.generation_id,
            source_generation_id = edit.source_generation_id,
            "Editing selected image",
        );
        self.adapter
            .generate_stateless(
                edit_system_prompt().to_string(),
                edit_parts(&image, &edit.edit_prompt),
                1,
            )
            .await
    }

    /// Record each response's signatures, then write its images and
    /// thumbnails and store their metadata pointing back at that record.
    /// Returns the number of images saved.
    async fn persist_output(
        &self,
        job: &GenerationJob,
        attempt: u32,
        output: &GenerationOutput,
    ) -> Result<usize, PipelineError> {
        let dir = output_dir(job.owner_id, job.project_id, job.generation_id);
        let mut index = 0;

        for turn in &output.turns {
            let turn_index = self
                .store
                .append_signatures(job.generation_id, &turn.signatures)
                .await?;

            for (slot, processed) in turn.images.iter().enumerate() {
                let file_path = format!("{dir}/{}", output_file_name(attempt, index));
                let thumbnail_path = format!("{dir}/{}", thumbnail_file_name(attempt, index));

                self.files.write(&file_path, &processed.png).await?;
                self.files.write(&thumbnail_path, &processed.thumbnail_jpeg).await?;

                self.store
                    .add_image(
                        job.generation_id,
                        &NewGeneratedImage {
                            file_path,
                            thumbnail_path: Some(thumbnail_path),
                            width: processed.width as i32,
                            height: processed.height as i32,
                            file_size: processed.png.len() as i64,
                            signature_turn: Some(turn_index),
                            signature_slot: Some(slot as i32),
                        },
                    )
                    .await?;
                index += 1;
            }
        }

        Ok(index)
    }
}

fn require_character(loaded: &LoadedInputs) -> Result<&[u8], PipelineError> {
    loaded
        .character
        .as_deref()
        .ok_or_else(|| PipelineError::Validation("IP change requires a character image".to_string()))
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

/// Default delay between queue polls of an idle worker task.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interval between queue housekeeping runs.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Fixed number of worker tasks draining the queue.
pub struct WorkerPool {
    worker: Arc<GenerationWorker>,
    queue: Arc<dyn JobQueue>,
    policy: RetryPolicy,
    concurrency: usize,
    job_timeout: Duration,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(
        worker: Arc<GenerationWorker>,
        queue: Arc<dyn JobQueue>,
        policy: RetryPolicy,
        concurrency: usize,
        job_timeout: Duration,
    ) -> Self {
        Self {
            worker,
            queue,
            policy,
            concurrency: concurrency.max(1),
            job_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Claim and settle at most one job. Returns whether a job was found.
    pub async fn run_once(&self) -> Result<bool, PipelineError> {
        let Some(queued) = self.queue.claim_next().await? else {
            return Ok(false);
        };
        self.worker
            .handle(self.queue.as_ref(), &self.policy, queued, self.job_timeout)
            .await?;
        Ok(true)
    }

    /// Run `concurrency` worker tasks plus housekeeping until cancelled.
    ///
    /// A job already in progress is finished before its task exits.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            concurrency = self.concurrency,
            job_timeout_secs = self.job_timeout.as_secs(),
            "Generation worker pool started",
        );

        let mut tasks = Vec::with_capacity(self.concurrency + 1);
        for slot in 0..self.concurrency {
            let pool = Arc::clone(&self);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move { pool.worker_loop(slot, cancel).await }));
        }
        let pool = Arc::clone(&self);
        let housekeeping_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            pool.housekeeping_loop(housekeeping_cancel).await
        }));

        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Generation worker pool stopped");
    }

    async fn worker_loop(&self, slot: usize, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(slot, "Worker task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Drain while work is available, then wait for the next tick.
                    loop {
                        match self.run_once().await {
                            Ok(true) if !cancel.is_cancelled() => continue,
                            Ok(_) => break,
                            Err(e) => {
                                tracing::error!(slot, error = %e, "Worker cycle failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn housekeeping_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.queue.housekeeping().await {
                        tracing::error!(error = %e, "Queue housekeeping failed");
                    }
                }
            }
        }
    }
}
