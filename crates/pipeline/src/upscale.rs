//! Upscale worker: serialized calls to an external Real-ESRGAN binary.
//!
//! The binary is GPU-bound, so a single-permit semaphore keeps at most one
//! process running per worker regardless of how many callers are waiting.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockup_core::upscale::{validate_scale, UpscaleModel};
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::error::PipelineError;
use crate::ports::Upscaler;

/// Default timeout for one upscale run.
pub const DEFAULT_UPSCALE_TIMEOUT: Duration = Duration::from_secs(300);

/// [`Upscaler`] invoking `realesrgan-ncnn-vulkan` (or a compatible CLI).
#[derive(Clone)]
pub struct RealEsrganUpscaler {
    binary: PathBuf,
    output_dir: PathBuf,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl RealEsrganUpscaler {
    pub fn new(binary: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
            timeout: DEFAULT_UPSCALE_TIMEOUT,
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{stem}_x{scale}.png` in the output directory.
    pub fn output_path(&self, input: &Path, scale: u8) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        self.output_dir.join(format!("{stem}_x{scale}.png"))
    }
}

#[async_trait]
impl Upscaler for RealEsrganUpscaler {
    async fn upscale(
        &self,
        input: &Path,
        scale: u8,
        model: UpscaleModel,
    ) -> Result<PathBuf, PipelineError> {
        let scale = validate_scale(scale)?;
        let output = self.output_path(input, scale);

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PipelineError::Internal(format!("Upscale semaphore closed: {e}")))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        tracing::info!(
            input = %input.display(),
            scale,
            model = model.as_str(),
            "Starting upscale",
        );
        let start = std::time::Instant::now();

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .arg("-i")
                .arg(input)
                .arg("-o")
                .arg(&output)
                .arg("-s")
                .arg(scale.to_string())
                .arg("-n")
                .arg(model.as_str())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let run = match result {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                tracing::error!(binary = %self.binary.display(), error = %e, "Upscaler could not be started");
                return Err(PipelineError::Internal(format!("Failed to execute upscaler: {e}")));
            }
            Err(_) => {
                tracing::error!(elapsed_ms, "Upscale timed out");
                return Err(PipelineError::Timeout(self.timeout.as_secs()));
            }
        };

        if !run.status.success() {
            let stderr = String::from_utf8_lossy(&run.stderr);
            tracing::error!(elapsed_ms, stderr = %stderr.trim(), "Upscale failed");
            return Err(PipelineError::Internal(format!(
                "Upscaler exited with {}: {}",
                run.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        if !tokio::fs::try_exists(&output).await? {
            return Err(PipelineError::Storage(format!(
                "Upscaler produced no output at {}",
                output.display()
            )));
        }

        tracing::info!(output = %output.display(), elapsed_ms, "Upscale finished");
        Ok(output)
    }
}
