#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use mockup_core::signature::ThoughtSignatures;
use mockup_core::types::DbId;
use mockup_pipeline::adapter::GenerationAdapter;
use mockup_pipeline::dispatcher::{CreateGeneration, JobDispatcher};
use mockup_pipeline::error::PipelineError;
use mockup_pipeline::ports::{
    FileStorage, ImageProvider, JobQueue, ProviderRequest, ProviderResponse,
};
use mockup_pipeline::queue::RetryPolicy;
use mockup_pipeline::storage::MemoryFileStorage;
use mockup_pipeline::store::{MemoryGenerationStore, MemoryJobQueue};
use mockup_pipeline::worker::GenerationWorker;

pub const OWNER_ID: DbId = 7;
pub const SOURCE_PATH: &str = "uploads/source.png";
pub const CHARACTER_PATH: &str = "uploads/character.png";

/// A small solid-colour PNG.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

/// What the next provider call does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return one image. Signatures are numbered by call.
    Image,
    /// Return one image without any signatures.
    Unsigned,
    /// Return bytes that are not an image.
    Corrupt,
    Fail(&'static str),
}

/// Plays back [`Step`]s in order, then repeats `fallback`.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Step::Image,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fallback: Step::Fail("provider unavailable"),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, PipelineError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Image => Ok(ProviderResponse {
                images: vec![png_fixture(32, 24)],
                signatures: ThoughtSignatures {
                    text_signature: Some(format!("text-sig-{call}")),
                    image_signatures: vec![format!("img-sig-{call}")],
                },
            }),
            Step::Unsigned => Ok(ProviderResponse {
                images: vec![png_fixture(32, 24)],
                signatures: ThoughtSignatures::default(),
            }),
            Step::Corrupt => Ok(ProviderResponse {
                images: vec![b"definitely not a png".to_vec()],
                signatures: ThoughtSignatures {
                    text_signature: Some(format!("text-sig-{call}")),
                    image_signatures: vec![format!("img-sig-{call}")],
                },
            }),
            Step::Fail(reason) => Err(PipelineError::ProviderCall(reason.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage that refuses one path
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryFileStorage`] but fails writes to paths ending in
/// `refused_suffix`.
pub struct RefusingStorage {
    pub inner: Arc<MemoryFileStorage>,
    pub refused_suffix: &'static str,
}

#[async_trait]
impl FileStorage for RefusingStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        if path.ends_with(self.refused_suffix) {
            return Err(PipelineError::Storage(format!("disk full while writing {path}")));
        }
        self.inner.write(path, bytes).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Dispatcher and worker wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<MemoryGenerationStore>,
    pub queue: Arc<MemoryJobQueue>,
    pub files: Arc<MemoryFileStorage>,
    pub provider: Arc<ScriptedProvider>,
    pub dispatcher: JobDispatcher,
    pub worker: GenerationWorker,
    pub policy: RetryPolicy,
    pub project_id: DbId,
}

impl Harness {
    /// Zero backoff so retried entries are due immediately.
    pub async fn new(provider: ScriptedProvider) -> Self {
        let policy = RetryPolicy {
            backoff_base: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let store = Arc::new(MemoryGenerationStore::new());
        let queue = Arc::new(MemoryJobQueue::new(policy));
        let files = Arc::new(MemoryFileStorage::new());
        let provider = Arc::new(provider);

        files.insert(SOURCE_PATH, png_fixture(64, 48)).await;
        files.insert(CHARACTER_PATH, png_fixture(16, 16)).await;
        let project = store.insert_project(OWNER_ID, "Spring catalogue").await;

        let dispatcher = JobDispatcher::new(store.clone(), queue.clone());
        let worker = GenerationWorker::new(
            store.clone(),
            files.clone(),
            GenerationAdapter::new(provider.clone()),
        );

        Self {
            store,
            queue,
            files,
            provider,
            dispatcher,
            worker,
            policy,
            project_id: project.id,
        }
    }

    /// An `ip_change` request using the seeded inputs.
    pub fn ip_change(&self, options: serde_json::Value) -> CreateGeneration {
        CreateGeneration {
            project_id: self.project_id,
            mode: mockup_core::generation::GenerationMode::IpChange,
            source_image_path: Some(SOURCE_PATH.to_string()),
            character_id: None,
            character_image_path: Some(CHARACTER_PATH.to_string()),
            texture_image_path: None,
            prompt: None,
            options: Some(options),
        }
    }

    /// Claim and settle one delivery. Returns `false` when nothing was due.
    pub async fn step(&self) -> bool {
        self.step_with(&self.worker).await
    }

    /// Settle deliveries until the queue is idle. Returns how many ran.
    pub async fn drain(&self) -> usize {
        self.drain_with(&self.worker).await
    }

    pub async fn step_with(&self, worker: &GenerationWorker) -> bool {
        let Some(queued) = self.queue.claim_next().await.unwrap() else {
            return false;
        };
        worker
            .handle(self.queue.as_ref(), &self.policy, queued, Duration::from_secs(30))
            .await
            .unwrap();
        true
    }

    pub async fn drain_with(&self, worker: &GenerationWorker) -> usize {
        let mut delivered = 0;
        while self.step_with(worker).await {
            delivered += 1;
        }
        delivered
    }
}
