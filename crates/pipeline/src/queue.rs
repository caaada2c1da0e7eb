//! Queue payload and delivery policy.

use std::time::Duration;

use mockup_core::generation::{EditInputs, GenerationInputs, GenerationMode};
use mockup_core::options::GenerationOptions;
use mockup_core::types::DbId;
use serde::{Deserialize, Serialize};

/// Everything a worker needs to process one request.
///
/// The payload is self-contained: the worker never re-reads the request's
/// mutable inputs, only its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub generation_id: DbId,
    pub owner_id: DbId,
    pub project_id: DbId,
    pub mode: GenerationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_generation_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<EditInputs>,
    pub options: GenerationOptions,
}

impl GenerationJob {
    pub fn inputs(&self) -> GenerationInputs {
        GenerationInputs {
            source_image_path: self.source_image_path.clone(),
            character_image_path: self.character_image_path.clone(),
            texture_image_path: self.texture_image_path.clone(),
            user_prompt: self.prompt.clone(),
            edit: self.edit.clone(),
        }
    }
}

/// A claimed queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: DbId,
    pub job: GenerationJob,
    /// 1-based delivery attempt.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl QueuedJob {
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Delivery attempts, backoff and retention of finished entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub priority: i32,
    pub keep_completed: u32,
    pub keep_failed: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(5_000),
            priority: 1,
            keep_completed: 100,
            keep_failed: 50,
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before the attempt after `attempt`:
    /// `base * 2^(attempt - 1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_secs(5));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(20));
    }

    #[test]
    fn defaults_match_queue_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.keep_completed, 100);
        assert_eq!(policy.keep_failed, 50);
    }

    #[test]
    fn payload_uses_camel_case_and_omits_absent_paths() {
        let job = GenerationJob {
            generation_id: 10,
            owner_id: 1,
            project_id: 2,
            mode: GenerationMode::SketchToReal,
            source_image_path: Some("uploads/sketch.png".into()),
            character_image_path: None,
            texture_image_path: None,
            prompt: None,
            parent_generation_id: None,
            edit: None,
            options: GenerationOptions::default(),
        };

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["generationId"], json!(10));
        assert_eq!(value["mode"], json!("sketch_to_real"));
        assert!(value.get("characterImagePath").is_none());
        assert!(value.get("edit").is_none());

        let back: GenerationJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn last_attempt_is_detected() {
        let job: GenerationJob = serde_json::from_value(json!({
            "generationId": 1, "ownerId": 1, "projectId": 1,
            "mode": "ip_change", "options": {}
        }))
        .unwrap();
        assert_eq!(job.options.output_count, 2);

        let mut queued = QueuedJob { id: 1, job, attempt: 2, max_attempts: 3 };
        assert!(!queued.is_last_attempt());
        queued.attempt = 3;
        assert!(queued.is_last_attempt());
    }
}
