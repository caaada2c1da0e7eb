//! Durable queue entries (`generation_jobs`).

use mockup_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJobRow {
    pub id: DbId,
    pub generation_id: DbId,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    pub priority: i32,
    /// Incremented on every claim, so it equals the current attempt number.
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
    pub run_after: Timestamp,
    pub last_error: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Per-entry delivery settings applied at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOptions {
    pub priority: i32,
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
}
