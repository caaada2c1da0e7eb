//! File storage backends and output image processing.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use mockup_core::generation::{THUMBNAIL_QUALITY, THUMBNAIL_SIZE};
use tokio::sync::RwLock;

use crate::error::PipelineError;
use crate::ports::FileStorage;

/// Only plain relative paths may reach the filesystem.
fn is_safe_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

// ---------------------------------------------------------------------------
// Local disk
// ---------------------------------------------------------------------------

/// Files under a single root directory on local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, PipelineError> {
        if !is_safe_relative_path(path) {
            return Err(PipelineError::Storage(format!("Refusing unsafe path '{path}'")));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| PipelineError::Storage(format!("Failed to read '{path}': {e}")))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| PipelineError::Storage(format!("Failed to write '{path}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Process-local storage, used by tests and the API test harness.
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.write().await.insert(path.into(), bytes);
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.files.read().await.contains_key(path)
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| PipelineError::Storage(format!("File not found: {path}")))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        self.files.write().await.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output processing
// ---------------------------------------------------------------------------

/// A provider image normalized for storage.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub png: Vec<u8>,
    pub thumbnail_jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    /// Decode provider bytes, re-encode as PNG and cut a square JPEG
    /// thumbnail (center crop).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        let decoded = image::load_from_memory(bytes)?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(PipelineError::Storage(
                "Generated image has no dimensions".to_string(),
            ));
        }

        let mut png = Vec::new();
        decoded.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let thumb = decoded
            .resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle)
            .to_rgb8();
        let mut thumbnail_jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut thumbnail_jpeg, THUMBNAIL_QUALITY)
            .encode_image(&DynamicImage::ImageRgb8(thumb))?;

        Ok(Self {
            png,
            thumbnail_jpeg,
            width,
            height,
        })
    }

    /// Run [`Self::from_bytes`] off the async runtime.
    pub async fn process(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        tokio::task::spawn_blocking(move || Self::from_bytes(&bytes))
            .await
            .map_err(|e| PipelineError::Internal(format!("Image processing task failed: {e}")))?
    }
}
