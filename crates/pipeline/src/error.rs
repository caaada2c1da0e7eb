//! Pipeline error taxonomy.

use mockup_core::error::CoreError;
use mockup_core::types::DbId;

/// Errors raised while dispatching or processing a generation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed options or a missing required input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Style-copy preconditions unmet (no parent image or signature record).
    #[error("Missing parent artifact: {0}")]
    MissingParentArtifact(String),

    /// An edit was requested on a generation with no selected image.
    #[error("Generation {0} has no selected image")]
    NoSelectedImage(DbId),

    /// A single provider call failed.
    #[error("Provider call failed: {0}")]
    ProviderCall(String),

    /// Every provider call of a batch failed.
    #[error("{0}")]
    GenerationFailed(String),

    /// Reading or writing a file failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the queue should deliver the job again.
    ///
    /// Errors caused by the request itself are terminal. Provider, storage,
    /// database and timeout failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::MissingParentArtifact(_)
                | PipelineError::NoSelectedImage(_)
                | PipelineError::NotFound { .. }
                | PipelineError::Forbidden(_)
        )
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => PipelineError::Validation(msg),
            CoreError::NotFound { entity, id } => PipelineError::NotFound { entity, id },
            CoreError::Forbidden(msg) | CoreError::Unauthorized(msg) => PipelineError::Forbidden(msg),
            CoreError::Internal(msg) => PipelineError::Internal(msg),
        }
    }
}

impl From<mockup_gemini::api::GeminiApiError> for PipelineError {
    fn from(err: mockup_gemini::api::GeminiApiError) -> Self {
        PipelineError::ProviderCall(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Storage(format!("image processing failed: {err}"))
    }
}
