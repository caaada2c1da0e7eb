//! End-to-end pipeline behaviour against in-memory collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{
    png_fixture, Harness, RefusingStorage, ScriptedProvider, Step, CHARACTER_PATH, OWNER_ID,
    SOURCE_PATH,
};
use mockup_core::generation::{MAX_EDIT_PROMPT_LENGTH, MAX_REFERENCE_IMAGES};
use mockup_core::system_prompt::edit_system_prompt;
use mockup_core::options::RawGenerationOptions;
use mockup_core::signature::{ThoughtSignatures, SIGNATURE_BYPASS};
use mockup_db::models::generation::NewGeneration;
use mockup_db::models::image::NewGeneratedImage;
use mockup_db::models::status::{GenerationStatus, QueueJobStatus};
use mockup_gemini::messages::{Part, Role};
use mockup_pipeline::adapter::GenerationAdapter;
use mockup_pipeline::dispatcher::{EditRequest, StyleCopyRequest};
use mockup_pipeline::error::PipelineError;
use mockup_pipeline::ports::{GenerationStore, JobQueue};
use mockup_pipeline::worker::{GenerationWorker, ProcessOutcome, WorkerPool};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Insert a completed parent directly, bypassing the worker.
async fn completed_parent(
    h: &Harness,
    image_path: &str,
    signatures: Option<ThoughtSignatures>,
) -> mockup_core::types::DbId {
    let parent = h
        .store
        .create_generation(&NewGeneration {
            project_id: h.project_id,
            owner_id: OWNER_ID,
            character_id: None,
            mode: mockup_core::generation::GenerationMode::IpChange,
            inputs: mockup_core::generation::GenerationInputs {
                source_image_path: Some(SOURCE_PATH.to_string()),
                character_image_path: Some(CHARACTER_PATH.to_string()),
                texture_image_path: None,
                user_prompt: Some("keep the logo".to_string()),
                edit: None,
            },
            options: Default::default(),
            parent_generation_id: None,
        })
        .await
        .unwrap();
    let turn = match signatures {
        Some(signatures) => Some(h.store.append_signatures(parent.id, &signatures).await.unwrap()),
        None => None,
    };
    h.store
        .add_image(
            parent.id,
            &NewGeneratedImage {
                file_path: image_path.to_string(),
                thumbnail_path: None,
                width: 32,
                height: 24,
                file_size: 100,
                signature_turn: turn,
                signature_slot: turn.map(|_| 0),
            },
        )
        .await
        .unwrap();
    h.store.force_status(parent.id, GenerationStatus::Completed).await;
    parent.id
}

fn style_copy_request() -> StyleCopyRequest {
    StyleCopyRequest {
        character_id: None,
        character_image_path: Some(CHARACTER_PATH.to_string()),
        prompt: None,
    }
}

// ---------------------------------------------------------------------------
// Stateless generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_provider_failures_still_complete() {
    let h = Harness::new(ScriptedProvider::new(vec![
        Step::Fail("rate limited"),
        Step::Image,
        Step::Fail("safety block"),
        Step::Image,
    ]))
    .await;

    let generation = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 4 })))
        .await
        .unwrap();
    assert_eq!(h.drain().await, 1);

    let view = h.dispatcher.status(OWNER_ID, generation.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Completed);
    assert_eq!(view.images.len(), 2);
    assert!(view.error_message.is_none());
    assert_eq!(h.provider.calls(), 4);

    let dir = format!("generations/{OWNER_ID}/{}/{}", h.project_id, generation.id);
    assert!(h.files.contains(&format!("{dir}/output_a1_1.png")).await);
    assert!(h.files.contains(&format!("{dir}/thumb_output_a1_2.jpg")).await);
    assert_eq!(view.images[0].width, 32);

    let signatures = h.store.list_signatures(generation.id).await.unwrap();
    assert_eq!(signatures.len(), 2);
    assert_eq!(signatures[0].image_signatures, vec!["img-sig-2".to_string()]);
}

#[tokio::test]
async fn undecodable_image_fails_only_its_own_call() {
    let h = Harness::new(ScriptedProvider::new(vec![Step::Corrupt, Step::Image])).await;

    let generation = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();
    assert_eq!(h.drain().await, 1);

    let view = h.dispatcher.status(OWNER_ID, generation.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Completed);
    assert_eq!(view.images.len(), 1);
    assert_eq!(h.provider.calls(), 2);

    let signatures = h.store.list_signatures(generation.id).await.unwrap();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].image_signatures, vec!["img-sig-2".to_string()]);
    assert_eq!(h.queue.entries().await[0].attempts_made, 1);
}

#[tokio::test]
async fn every_batch_with_one_undecodable_image_still_completes() {
    let h = Harness::new(ScriptedProvider::new(vec![
        Step::Corrupt,
        Step::Image,
        Step::Corrupt,
        Step::Image,
        Step::Corrupt,
        Step::Image,
    ]))
    .await;

    let first = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();
    let second = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();
    let third = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();
    assert_eq!(h.drain().await, 3);

    for id in [first.id, second.id, third.id] {
        let view = h.dispatcher.status(OWNER_ID, id).await.unwrap();
        assert_eq!(view.status, GenerationStatus::Completed);
        assert_eq!(view.images.len(), 1);
    }
    assert_eq!(h.provider.calls(), 6);
}

#[tokio::test]
async fn all_calls_failing_marks_request_failed() {
    let h = Harness::new(ScriptedProvider::failing()).await;

    let generation = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();
    assert_eq!(h.drain().await, 3);

    let view = h.dispatcher.status(OWNER_ID, generation.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Failed);
    let message = view.error_message.unwrap();
    assert!(message.contains("All image generations failed"), "got: {message}");
    assert!(view.images.is_empty());
    assert_eq!(h.provider.calls(), 6);

    let entries = h.queue.entries().await;
    assert_eq!(entries[0].status, QueueJobStatus::Failed);
    assert_eq!(entries[0].attempts_made, 3);
}

#[tokio::test]
async fn retried_attempt_stays_processing_then_completes() {
    let h = Harness::new(ScriptedProvider::new(vec![
        Step::Fail("timeout"),
        Step::Fail("timeout"),
    ]))
    .await;

    let generation = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();

    assert!(h.step().await);
    let view = h.dispatcher.status(OWNER_ID, generation.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Processing);
    assert!(view.error_message.is_some());
    assert_eq!(h.queue.entries().await[0].status, QueueJobStatus::Queued);

    assert!(h.step().await);
    let view = h.dispatcher.status(OWNER_ID, generation.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Completed);
    assert_eq!(view.images.len(), 2);
    assert!(view.images[0].file_path.ends_with("output_a2_1.png"));
    assert!(view.error_message.is_none());
}

#[tokio::test]
async fn duplicate_delivery_is_skipped() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;

    let generation = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();
    h.drain().await;
    let calls = h.provider.calls();

    let job = h.queue.entries().await[0].job.clone();
    let outcome = h.worker.process(&job, 2).await.unwrap();

    assert_eq!(outcome, ProcessOutcome::Skipped);
    assert_eq!(h.provider.calls(), calls);
    let images = h.store.list_images(generation.id).await.unwrap();
    assert_eq!(images.len(), 1);
}

#[tokio::test]
async fn missing_character_is_rejected_before_enqueue() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let mut request = h.ip_change(json!({}));
    request.character_image_path = None;

    let err = h.dispatcher.submit(OWNER_ID, request).await.unwrap_err();

    assert_matches!(err, PipelineError::Validation(_));
    assert!(h.queue.entries().await.is_empty());
}

#[tokio::test]
async fn unknown_option_is_a_validation_error() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;

    let err = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "sparkle": true })))
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::Validation(_));
}

#[tokio::test]
async fn reference_images_beyond_limit_are_dropped() {
    let provider = std::sync::Arc::new(ScriptedProvider::succeeding());
    let adapter = GenerationAdapter::new(provider.clone());
    let png = png_fixture(4, 4);
    let parts: Vec<Part> = (0..MAX_REFERENCE_IMAGES + 2).map(|_| Part::png(&png)).collect();

    let output = adapter
        .generate_stateless("system".to_string(), parts, 1)
        .await
        .unwrap();

    assert_eq!(output.image_count(), 1);
    let sent = &provider.requests()[0];
    let images = sent.contents[0]
        .parts
        .iter()
        .filter(|p| p.inline_data.is_some())
        .count();
    assert_eq!(images, MAX_REFERENCE_IMAGES);
}

// ---------------------------------------------------------------------------
// Regenerate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn regenerate_changes_only_overridden_options() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let original = h
        .dispatcher
        .submit(
            OWNER_ID,
            h.ip_change(json!({
                "viewpointLock": true,
                "whiteBackground": true,
                "outputCount": 3,
                "userInstructions": "keep the logo"
            })),
        )
        .await
        .unwrap();

    let regenerated = h
        .dispatcher
        .regenerate(
            OWNER_ID,
            original.id,
            RawGenerationOptions {
                white_background: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_ne!(regenerated.id, original.id);
    let before = original.options().unwrap();
    let after = regenerated.options().unwrap();
    assert!(after.viewpoint_lock);
    assert!(!after.white_background);
    assert_eq!(after.output_count, 3);
    assert_eq!(after.user_instructions, before.user_instructions);
    assert_eq!(regenerated.inputs().unwrap(), original.inputs().unwrap());

    let stored = h.store.find_generation(original.id).await.unwrap().unwrap();
    assert!(stored.options().unwrap().white_background);
    assert_eq!(h.queue.entries().await.len(), 2);
}

#[tokio::test]
async fn regenerate_of_foreign_request_is_not_found() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let original = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({})))
        .await
        .unwrap();

    let err = h
        .dispatcher
        .regenerate(OWNER_ID + 1, original.id, RawGenerationOptions::default())
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::NotFound { entity: "Generation", .. });
}

// ---------------------------------------------------------------------------
// Style copy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn style_copy_of_pending_parent_is_rejected() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let parent = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({})))
        .await
        .unwrap();

    let err = h
        .dispatcher
        .style_copy(OWNER_ID, parent.id, style_copy_request())
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::Validation(_));
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(h.queue.entries().await.len(), 1);
}

#[tokio::test]
async fn style_copy_without_signatures_is_rejected() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    h.files.insert("generations/parent.png", png_fixture(8, 8)).await;
    let parent_id = completed_parent(&h, "generations/parent.png", None).await;

    let err = h
        .dispatcher
        .style_copy(OWNER_ID, parent_id, style_copy_request())
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::MissingParentArtifact(_));
    assert!(h.queue.entries().await.is_empty());
}

#[tokio::test]
async fn style_copy_replays_selected_image_signatures() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let parent = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();
    h.drain().await;

    let images = h.store.list_images(parent.id).await.unwrap();
    h.dispatcher
        .select_image(OWNER_ID, parent.id, images[1].id)
        .await
        .unwrap();

    let child = h
        .dispatcher
        .style_copy(OWNER_ID, parent.id, style_copy_request())
        .await
        .unwrap();
    assert_eq!(child.parent_generation_id, Some(parent.id));
    assert!(child.options().unwrap().style_copy);
    h.drain().await;

    let request = h.provider.requests().pop().unwrap();
    assert_eq!(request.contents.len(), 3);
    let model_turn = &request.contents[1];
    assert_eq!(model_turn.role, Some(Role::Model));
    assert_eq!(model_turn.parts[0].thought_signature.as_deref(), Some("text-sig-2"));
    assert_eq!(model_turn.parts[1].thought_signature.as_deref(), Some("img-sig-2"));

    let view = h.dispatcher.status(OWNER_ID, child.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Completed);
    assert_eq!(view.images.len(), 1);
    assert_eq!(h.provider.calls(), 3);
}

#[tokio::test]
async fn style_copy_after_partial_retry_replays_the_selected_images_own_signature() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let flaky_worker = GenerationWorker::new(
        h.store.clone(),
        Arc::new(RefusingStorage {
            inner: h.files.clone(),
            refused_suffix: "/output_a1_2.png",
        }),
        GenerationAdapter::new(h.provider.clone()),
    );

    let parent = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2 })))
        .await
        .unwrap();
    assert_eq!(h.drain_with(&flaky_worker).await, 2);

    // Attempt 1 kept output_a1_1 (call 1) and recorded call 2 before its
    // write failed. Attempt 2 produced calls 3 and 4.
    let signatures = h.store.list_signatures(parent.id).await.unwrap();
    assert_eq!(signatures.len(), 4);
    let images = h.store.list_images(parent.id).await.unwrap();
    let names: Vec<_> = images
        .iter()
        .map(|i| i.file_path.rsplit('/').next().unwrap().to_string())
        .collect();
    assert_eq!(names, ["output_a1_1.png", "output_a2_1.png", "output_a2_2.png"]);

    h.dispatcher
        .select_image(OWNER_ID, parent.id, images[2].id)
        .await
        .unwrap();
    h.dispatcher
        .style_copy(OWNER_ID, parent.id, style_copy_request())
        .await
        .unwrap();
    h.drain().await;

    let request = h.provider.requests().pop().unwrap();
    let model_turn = &request.contents[1];
    assert_eq!(model_turn.parts[0].thought_signature.as_deref(), Some("text-sig-4"));
    assert_eq!(model_turn.parts[1].thought_signature.as_deref(), Some("img-sig-4"));
}

#[tokio::test]
async fn blank_signatures_are_replaced_by_bypass_token() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    h.files.insert("generations/parent.png", png_fixture(8, 8)).await;
    let parent_id = completed_parent(
        &h,
        "generations/parent.png",
        Some(ThoughtSignatures {
            text_signature: None,
            image_signatures: vec![String::new()],
        }),
    )
    .await;

    h.dispatcher
        .style_copy(OWNER_ID, parent_id, style_copy_request())
        .await
        .unwrap();
    h.drain().await;

    let request = h.provider.requests().pop().unwrap();
    let model_turn = &request.contents[1];
    assert_eq!(model_turn.parts[0].thought_signature.as_deref(), Some(SIGNATURE_BYPASS));
    assert_eq!(model_turn.parts[1].thought_signature.as_deref(), Some(SIGNATURE_BYPASS));
    assert!(request.contents[0].parts[0]
        .text
        .as_deref()
        .unwrap()
        .contains("Additional instructions: keep the logo"));
}

#[tokio::test]
async fn unreadable_parent_image_fails_without_retry() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let parent_id = completed_parent(
        &h,
        "generations/missing.png",
        Some(ThoughtSignatures {
            text_signature: Some("t".to_string()),
            image_signatures: vec!["i".to_string()],
        }),
    )
    .await;

    let child = h
        .dispatcher
        .style_copy(OWNER_ID, parent_id, style_copy_request())
        .await
        .unwrap();
    assert_eq!(h.drain().await, 1);

    let view = h.dispatcher.status(OWNER_ID, child.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Failed);
    assert!(view.error_message.unwrap().contains("Missing parent artifact"));
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(h.queue.entries().await[0].attempts_made, 1);
}

// ---------------------------------------------------------------------------
// Partial edit
// ---------------------------------------------------------------------------

fn edit_request(prompt: &str) -> EditRequest {
    EditRequest {
        prompt: prompt.to_string(),
    }
}

#[tokio::test]
async fn edit_of_selected_image_creates_a_child_request() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let parent = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 2, "removeShadows": true })))
        .await
        .unwrap();
    h.drain().await;
    let images = h.store.list_images(parent.id).await.unwrap();
    h.dispatcher
        .select_image(OWNER_ID, parent.id, images[1].id)
        .await
        .unwrap();

    let child = h
        .dispatcher
        .edit(OWNER_ID, parent.id, edit_request("  make the zipper gold "))
        .await
        .unwrap();
    assert_eq!(child.project_id, parent.project_id);
    assert_eq!(child.parent_generation_id, None);
    assert!(child.options().unwrap().remove_shadows);
    let edit = child.inputs().unwrap().edit.unwrap();
    assert_eq!(edit.source_generation_id, parent.id);
    assert_eq!(edit.image_path, images[1].file_path);
    assert_eq!(edit.edit_prompt, "make the zipper gold");

    assert_eq!(h.drain().await, 1);
    let view = h.dispatcher.status(OWNER_ID, child.id).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Completed);
    assert_eq!(view.images.len(), 1);
    assert_eq!(h.provider.calls(), 3);

    let request = h.provider.requests().pop().unwrap();
    assert_eq!(request.system_instruction, edit_system_prompt());
    assert_eq!(request.contents.len(), 1);
    let parts = &request.contents[0].parts;
    assert_eq!(parts.len(), 2);
    assert!(parts[0].inline_data.is_some());
    assert_eq!(parts[1].text.as_deref(), Some("Edit request: make the zipper gold"));

    let parent_view = h.dispatcher.status(OWNER_ID, parent.id).await.unwrap();
    assert_eq!(parent_view.images.len(), 2);
}

#[tokio::test]
async fn edit_without_selected_image_is_rejected() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let parent = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();
    h.drain().await;

    let err = h
        .dispatcher
        .edit(OWNER_ID, parent.id, edit_request("remove the tag"))
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::NoSelectedImage(id) if id == parent.id);
    assert_eq!(h.queue.entries().await.len(), 1);
}

#[tokio::test]
async fn edit_prompt_must_be_present_and_short() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let parent = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();
    h.drain().await;
    let image = h.store.list_images(parent.id).await.unwrap().remove(0);
    h.dispatcher
        .select_image(OWNER_ID, parent.id, image.id)
        .await
        .unwrap();

    for prompt in ["   ".to_string(), "x".repeat(MAX_EDIT_PROMPT_LENGTH + 1)] {
        let err = h
            .dispatcher
            .edit(OWNER_ID, parent.id, edit_request(&prompt))
            .await
            .unwrap_err();
        assert_matches!(err, PipelineError::Validation(_));
    }
}

#[tokio::test]
async fn edit_of_foreign_request_is_not_found() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let parent = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();
    h.drain().await;

    let err = h
        .dispatcher
        .edit(OWNER_ID + 1, parent.id, edit_request("remove the tag"))
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::NotFound { entity: "Generation", .. });
}

// ---------------------------------------------------------------------------
// Selection and history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn selecting_an_image_clears_the_others() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let generation = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 3 })))
        .await
        .unwrap();
    h.drain().await;
    let images = h.store.list_images(generation.id).await.unwrap();

    h.dispatcher
        .select_image(OWNER_ID, generation.id, images[0].id)
        .await
        .unwrap();
    let selected = h
        .dispatcher
        .select_image(OWNER_ID, generation.id, images[2].id)
        .await
        .unwrap();
    assert!(selected.is_selected);

    let view = h.dispatcher.status(OWNER_ID, generation.id).await.unwrap();
    let flags: Vec<bool> = view.images.iter().map(|i| i.is_selected).collect();
    assert_eq!(flags, vec![false, false, true]);

    let err = h
        .dispatcher
        .select_image(OWNER_ID, generation.id, 9_999)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::NotFound { entity: "GeneratedImage", .. });
}

#[tokio::test]
async fn history_lists_completed_requests_newest_first() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let first = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();
    let second = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();
    h.drain().await;
    let pending = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({})))
        .await
        .unwrap();

    let image = h.store.list_images(first.id).await.unwrap().remove(0);
    h.dispatcher
        .select_image(OWNER_ID, first.id, image.id)
        .await
        .unwrap();

    let page = h
        .dispatcher
        .project_history(OWNER_ID, h.project_id, None, None)
        .await
        .unwrap();

    let ids: Vec<_> = page.items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(!ids.contains(&pending.id));
    assert!(page.items[0].selected_image.is_none());
    assert_eq!(page.items[1].selected_image.as_ref().unwrap().id, image.id);
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.pagination.limit, 20);
    assert_eq!(page.pagination.total_pages, 1);

    let second_page = h
        .dispatcher
        .project_history(OWNER_ID, h.project_id, Some(2), Some(1))
        .await
        .unwrap();
    assert_eq!(second_page.items.len(), 1);
    assert_eq!(second_page.items[0].id, first.id);
}

#[tokio::test]
async fn history_of_foreign_project_is_not_found() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;

    let err = h
        .dispatcher
        .project_history(OWNER_ID + 1, h.project_id, None, None)
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::NotFound { entity: "Project", .. });
}

#[tokio::test]
async fn character_id_resolves_to_stored_file() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let character = h
        .store
        .insert_character(h.project_id, "Mascot", CHARACTER_PATH)
        .await;
    let mut request = h.ip_change(json!({}));
    request.character_image_path = None;
    request.character_id = Some(character.id);

    let generation = h.dispatcher.submit(OWNER_ID, request).await.unwrap();

    let inputs = generation.inputs().unwrap();
    assert_eq!(inputs.character_image_path.as_deref(), Some(CHARACTER_PATH));
    assert_eq!(generation.character_id, Some(character.id));
    let queued = h.queue.claim_next().await.unwrap().unwrap();
    assert_eq!(queued.job.character_image_path.as_deref(), Some(CHARACTER_PATH));
}

#[tokio::test]
async fn worker_pool_drains_queue_until_cancelled() {
    let h = Harness::new(ScriptedProvider::succeeding()).await;
    let first = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();
    let second = h
        .dispatcher
        .submit(OWNER_ID, h.ip_change(json!({ "outputCount": 1 })))
        .await
        .unwrap();

    let worker = Arc::new(GenerationWorker::new(
        h.store.clone(),
        h.files.clone(),
        GenerationAdapter::new(h.provider.clone()),
    ));
    let pool = Arc::new(
        WorkerPool::new(worker, h.queue.clone(), h.policy, 2, Duration::from_secs(30))
            .with_poll_interval(Duration::from_millis(10)),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(pool.clone().run(cancel.clone()));

    let mut settled = false;
    for _ in 0..200 {
        let a = h.dispatcher.status(OWNER_ID, first.id).await.unwrap();
        let b = h.dispatcher.status(OWNER_ID, second.id).await.unwrap();
        if a.status == GenerationStatus::Completed && b.status == GenerationStatus::Completed {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pool stops after cancellation")
        .unwrap();

    assert!(settled);
    assert_eq!(h.provider.calls(), 2);
    assert!(!pool.run_once().await.unwrap());
}
