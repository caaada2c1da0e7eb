//! Generation request rows and DTOs.

use mockup_core::error::CoreError;
use mockup_core::generation::{GenerationInputs, GenerationMode};
use mockup_core::options::GenerationOptions;
use mockup_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{GenerationStatus, StatusId};

/// A row from the `generations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    pub project_id: DbId,
    pub owner_id: DbId,
    pub character_id: Option<DbId>,
    pub mode: String,
    pub status_id: StatusId,
    pub prompt_data: serde_json::Value,
    pub options: serde_json::Value,
    pub parent_generation_id: Option<DbId>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Generation {
    pub fn mode(&self) -> Result<GenerationMode, CoreError> {
        GenerationMode::parse(&self.mode)
    }

    pub fn status(&self) -> Result<GenerationStatus, CoreError> {
        GenerationStatus::from_id(self.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "generation {} has unknown status_id {}",
                self.id, self.status_id
            ))
        })
    }

    /// Decode the stored `prompt_data` column.
    pub fn inputs(&self) -> Result<GenerationInputs, CoreError> {
        serde_json::from_value(self.prompt_data.clone()).map_err(|e| {
            CoreError::Internal(format!("generation {} has malformed prompt_data: {e}", self.id))
        })
    }

    /// Decode the stored `options` column.
    ///
    /// Rows always hold canonical options, so no legacy migration happens here.
    pub fn options(&self) -> Result<GenerationOptions, CoreError> {
        serde_json::from_value(self.options.clone()).map_err(|e| {
            CoreError::Internal(format!("generation {} has malformed options: {e}", self.id))
        })
    }
}

/// Values needed to insert a new `pending` generation.
#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub project_id: DbId,
    pub owner_id: DbId,
    pub character_id: Option<DbId>,
    pub mode: GenerationMode,
    pub inputs: GenerationInputs,
    pub options: GenerationOptions,
    pub parent_generation_id: Option<DbId>,
}
