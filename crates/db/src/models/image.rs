//! Generated image rows.

use mockup_core::signature::SignatureSlot;
use mockup_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `generated_images` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GeneratedImage {
    pub id: DbId,
    pub generation_id: DbId,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub is_selected: bool,
    pub width: i32,
    pub height: i32,
    pub file_size: i64,
    pub signature_turn: Option<i32>,
    pub signature_slot: Option<i32>,
    pub created_at: Timestamp,
}

impl GeneratedImage {
    /// Where this image's continuation tokens were recorded, if anywhere.
    pub fn continuation_slot(&self) -> Option<SignatureSlot> {
        let turn = usize::try_from(self.signature_turn?).ok()?;
        let slot = usize::try_from(self.signature_slot?).ok()?;
        Some(SignatureSlot { turn, slot })
    }
}

/// Metadata for an image the worker has just written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGeneratedImage {
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub width: i32,
    pub height: i32,
    pub file_size: i64,
    pub signature_turn: Option<i32>,
    pub signature_slot: Option<i32>,
}
