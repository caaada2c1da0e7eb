//! Rebuilds the conversation a style-copy request continues from.
//!
//! The parent's prompt, its selected (or first) image and the continuation
//! signatures recorded for that image are replayed as prior turns, so the
//! provider treats the new request as a follow-up instead of a fresh one.

use mockup_core::signature::{resolve_continuation, ContinuationTokens};
use mockup_core::types::DbId;
use mockup_db::models::generation::Generation;
use mockup_db::models::status::GenerationStatus;
use mockup_gemini::messages::{Content, Part};

use crate::adapter::instruction_text;
use crate::error::PipelineError;
use crate::ports::{FileStorage, GenerationStore};

/// Text of the replayed model turn.
const PRIOR_TURN_ACK: &str = "Generation complete.";

/// Everything needed to replay a completed parent generation.
#[derive(Debug, Clone)]
pub struct ParentArtifact {
    pub generation: Generation,
    pub prompt_text: String,
    pub image_bytes: Vec<u8>,
    pub tokens: ContinuationTokens,
}

/// Load the parent of a style-copy request.
///
/// Fails with [`PipelineError::MissingParentArtifact`] when the parent is
/// gone, not completed, has no signature record or no image, or when the
/// image file cannot be read.
pub async fn load_parent_artifact(
    store: &dyn GenerationStore,
    files: &dyn FileStorage,
    parent_id: DbId,
) -> Result<ParentArtifact, PipelineError> {
    let generation = store.find_generation(parent_id).await?.ok_or_else(|| {
        PipelineError::MissingParentArtifact(format!("Parent generation {parent_id} not found"))
    })?;

    if generation.status()? != GenerationStatus::Completed {
        return Err(PipelineError::MissingParentArtifact(format!(
            "Parent generation {parent_id} is not completed"
        )));
    }

    let turns = store.list_signatures(parent_id).await?;
    if turns.is_empty() {
        return Err(PipelineError::MissingParentArtifact(format!(
            "Parent generation {parent_id} has no continuation signatures"
        )));
    }

    let images = store.list_images(parent_id).await?;
    let Some(image) = images.iter().find(|i| i.is_selected).or_else(|| images.first()) else {
        return Err(PipelineError::MissingParentArtifact(format!(
            "Parent generation {parent_id} has no images"
        )));
    };

    let image_bytes = files.read(&image.file_path).await.map_err(|e| {
        PipelineError::MissingParentArtifact(format!(
            "Parent image '{}' could not be read: {e}",
            image.file_path
        ))
    })?;

    let inputs = generation.inputs()?;
    let prompt_text = instruction_text(generation.mode()?, inputs.user_prompt.as_deref());

    Ok(ParentArtifact {
        tokens: resolve_continuation(&turns, image.continuation_slot()),
        generation,
        prompt_text,
        image_bytes,
    })
}

/// Prior user turn, replayed model turn, then the new user turn.
pub fn build_conversation(parent: &ParentArtifact, new_parts: Vec<Part>) -> Vec<Content> {
    vec![
        Content::user(vec![Part::text(parent.prompt_text.clone())]),
        Content::model(vec![
            Part::text(PRIOR_TURN_ACK).with_signature(parent.tokens.text.clone()),
            Part::png(&parent.image_bytes).with_signature(parent.tokens.image.clone()),
        ]),
        Content::user(new_parts),
    ]
}

#[cfg(test)]
mod tests {
    use mockup_core::signature::SIGNATURE_BYPASS;
    use mockup_gemini::messages::Role;

    use super::*;

    fn artifact(text: &str, image: &str) -> ParentArtifact {
        ParentArtifact {
            generation: Generation {
                id: 1,
                project_id: 1,
                owner_id: 1,
                character_id: None,
                mode: "ip_change".into(),
                status_id: GenerationStatus::Completed.id(),
                prompt_data: serde_json::json!({}),
                options: serde_json::json!({}),
                parent_generation_id: None,
                error_message: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
                completed_at: Some(chrono::Utc::now()),
            },
            prompt_text: "previous prompt".into(),
            image_bytes: vec![1, 2, 3],
            tokens: ContinuationTokens {
                text: text.into(),
                image: image.into(),
            },
        }
    }

    #[test]
    fn conversation_has_three_turns_in_order() {
        let turns = build_conversation(&artifact("t-sig", "i-sig"), vec![Part::text("new")]);

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Some(Role::User));
        assert_eq!(turns[0].parts[0].text.as_deref(), Some("previous prompt"));
        assert_eq!(turns[1].role, Some(Role::Model));
        assert_eq!(turns[1].parts[0].thought_signature.as_deref(), Some("t-sig"));
        assert_eq!(turns[1].parts[1].thought_signature.as_deref(), Some("i-sig"));
        assert!(turns[1].parts[1].inline_data.is_some());
        assert_eq!(turns[2].parts[0].text.as_deref(), Some("new"));
    }

    #[test]
    fn bypass_tokens_are_replayed_verbatim() {
        let turns = build_conversation(&artifact(SIGNATURE_BYPASS, SIGNATURE_BYPASS), vec![]);
        assert_eq!(turns[1].parts[0].thought_signature.as_deref(), Some(SIGNATURE_BYPASS));
    }
}
