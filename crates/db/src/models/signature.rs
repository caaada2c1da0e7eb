//! Continuation signature rows, one per provider response.

use mockup_core::signature::ThoughtSignatures;
use mockup_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `continuation_signatures` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContinuationSignature {
    pub id: DbId,
    pub generation_id: DbId,
    pub turn_index: i32,
    pub text_signature: Option<String>,
    pub image_signatures: Vec<String>,
    pub created_at: Timestamp,
}

impl From<ContinuationSignature> for ThoughtSignatures {
    fn from(row: ContinuationSignature) -> Self {
        ThoughtSignatures {
            text_signature: row.text_signature,
            image_signatures: row.image_signatures,
        }
    }
}
