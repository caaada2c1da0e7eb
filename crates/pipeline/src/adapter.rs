//! Generation Adapter: turns assembled inputs into provider calls.
//!
//! Two paths exist. The stateless path makes one independent call per
//! requested output, sequentially, and absorbs individual failures. The
//! multi-turn path makes exactly one call with a replayed history. Either
//! way the batch only fails when no image at all was produced.

use std::sync::Arc;

use async_trait::async_trait;
use mockup_core::generation::{GenerationMode, MAX_REFERENCE_IMAGES};
use mockup_core::signature::ThoughtSignatures;
use mockup_gemini::api::{GeminiApi, GeminiApiError};
use mockup_gemini::extract::{ensure_candidates, extract_images, extract_signatures};
use mockup_gemini::messages::{Content, GenerateContentRequest, GenerationConfig, Part};

use crate::error::PipelineError;
use crate::ports::{ImageProvider, ProviderRequest, ProviderResponse};
use crate::storage::ProcessedImage;

const IP_CHANGE_INSTRUCTION: &str = "Replace the character on this product with the character below:";

const SKETCH_TO_REAL_INSTRUCTION: &str =
    "Turn this sketch into a photorealistic photograph of the finished product.";

const TEXTURE_REFERENCE_LABEL: &str = "Texture reference:";

const STYLE_COPY_INSTRUCTION: &str = "\
Apply the style of the previous image to the product below, replacing the character with the new one.";

const SOURCE_STRUCTURE_LABEL: &str = "SOURCE STRUCTURE:";

const NEW_CHARACTER_LABEL: &str = "NEW CHARACTER:";

// ---------------------------------------------------------------------------
// Request parts
// ---------------------------------------------------------------------------

/// The user-turn instruction for `mode`, with the free-form prompt appended.
///
/// Also used to replay a parent's prompt in a continuation.
pub fn instruction_text(mode: GenerationMode, user_prompt: Option<&str>) -> String {
    let base = match mode {
        GenerationMode::IpChange => IP_CHANGE_INSTRUCTION,
        GenerationMode::SketchToReal => SKETCH_TO_REAL_INSTRUCTION,
    };
    match additional_instructions(user_prompt) {
        Some(extra) => format!("{base}\n\n{extra}"),
        None => base.to_string(),
    }
}

fn additional_instructions(user_prompt: Option<&str>) -> Option<String> {
    user_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("Additional instructions: {p}"))
}

/// Source photo, instruction, new character.
pub fn ip_change_parts(source: &[u8], character: &[u8], user_prompt: Option<&str>) -> Vec<Part> {
    let mut parts = vec![
        Part::png(source),
        Part::text(IP_CHANGE_INSTRUCTION),
        Part::png(character),
    ];
    if let Some(extra) = additional_instructions(user_prompt) {
        parts.push(Part::text(extra));
    }
    parts
}

/// Instruction, sketch, optional labelled texture, optional extra text.
pub fn sketch_to_real_parts(sketch: &[u8], texture: Option<&[u8]>, user_prompt: Option<&str>) -> Vec<Part> {
    let mut parts = vec![Part::text(SKETCH_TO_REAL_INSTRUCTION), Part::png(sketch)];
    if let Some(texture) = texture {
        parts.push(Part::text(TEXTURE_REFERENCE_LABEL));
        parts.push(Part::png(texture));
    }
    if let Some(extra) = additional_instructions(user_prompt) {
        parts.push(Part::text(extra));
    }
    parts
}

/// New user turn of a style-copy continuation. The style reference is the
/// parent image already present in the replayed model turn.
pub fn style_copy_parts(source: &[u8], character: &[u8], user_prompt: Option<&str>) -> Vec<Part> {
    let mut parts = vec![
        Part::text(STYLE_COPY_INSTRUCTION),
        Part::text(SOURCE_STRUCTURE_LABEL),
        Part::png(source),
        Part::text(NEW_CHARACTER_LABEL),
        Part::png(character),
    ];
    if let Some(extra) = additional_instructions(user_prompt) {
        parts.push(Part::text(extra));
    }
    parts
}

/// The image being edited, then the edit request.
pub fn edit_parts(image: &[u8], edit_prompt: &str) -> Vec<Part> {
    vec![
        Part::png(image),
        Part::text(format!("Edit request: {}", edit_prompt.trim())),
    ]
}

/// Keep at most [`MAX_REFERENCE_IMAGES`] inline images across all turns,
/// dropping the excess from the end. Returns how many were dropped.
pub fn limit_reference_images(contents: &mut [Content]) -> usize {
    let mut seen = 0;
    let mut dropped = 0;
    for content in contents.iter_mut() {
        content.parts.retain(|part| {
            if part.inline_data.is_none() {
                return true;
            }
            seen += 1;
            if seen > MAX_REFERENCE_IMAGES {
                dropped += 1;
                false
            } else {
                true
            }
        });
    }
    dropped
}

/// Pad or trim image signatures to one per returned image, so each image
/// has a slot in its response's record. Missing entries are left
/// blank and replaced by the bypass token when replayed.
fn align_signatures(mut signatures: ThoughtSignatures, image_count: usize) -> ThoughtSignatures {
    signatures.image_signatures.resize(image_count, String::new());
    signatures
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Decoded images of one successful provider response and its signatures.
#[derive(Debug, Clone)]
pub struct GeneratedTurn {
    pub images: Vec<ProcessedImage>,
    /// Aligned to `images`: one image signature per image.
    pub signatures: ThoughtSignatures,
}

/// Successful responses of one batch, in call order.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub turns: Vec<GeneratedTurn>,
}

impl GenerationOutput {
    pub fn image_count(&self) -> usize {
        self.turns.iter().map(|t| t.images.len()).sum()
    }
}

#[derive(Clone)]
pub struct GenerationAdapter {
    provider: Arc<dyn ImageProvider>,
}

impl GenerationAdapter {
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self { provider }
    }

    /// One independent call per output. Failed calls are logged and skipped.
    pub async fn generate_stateless(
        &self,
        system_instruction: String,
        parts: Vec<Part>,
        output_count: usize,
    ) -> Result<GenerationOutput, PipelineError> {
        let request = build_request(system_instruction, vec![Content::user(parts)]);
        let mut output = GenerationOutput::default();
        let mut last_error = None;

        for attempt in 1..=output_count {
            match self.call(&request).await {
                Ok(turn) => output.turns.push(turn),
                Err(e) => {
                    tracing::warn!(attempt, output_count, error = %e, "Image generation attempt failed");
                    last_error = Some(e);
                }
            }
        }

        finish(output, output_count, last_error)
    }

    /// Exactly one call carrying the replayed history.
    pub async fn generate_multi_turn(
        &self,
        system_instruction: String,
        contents: Vec<Content>,
    ) -> Result<GenerationOutput, PipelineError> {
        let request = build_request(system_instruction, contents);
        let mut output = GenerationOutput::default();
        let last_error = match self.call(&request).await {
            Ok(turn) => {
                output.turns.push(turn);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Continuation call failed");
                Some(e)
            }
        };
        finish(output, 1, last_error)
    }

    /// One provider call, validated and decoded. Any image that does not
    /// decode fails the whole call.
    async fn call(&self, request: &ProviderRequest) -> Result<GeneratedTurn, PipelineError> {
        let response = self.provider.generate(request).await?;
        if response.images.is_empty() {
            return Err(PipelineError::ProviderCall(
                "Provider response contained no image".to_string(),
            ));
        }

        let count = response.images.len();
        let mut images = Vec::with_capacity(count);
        for bytes in response.images {
            let processed = ProcessedImage::process(bytes).await.map_err(|e| {
                PipelineError::ProviderCall(format!("Provider returned an undecodable image: {e}"))
            })?;
            images.push(processed);
        }

        Ok(GeneratedTurn {
            images,
            signatures: align_signatures(response.signatures, count),
        })
    }
}

fn build_request(system_instruction: String, mut contents: Vec<Content>) -> ProviderRequest {
    let dropped = limit_reference_images(&mut contents);
    if dropped > 0 {
        tracing::warn!(
            dropped,
            max = MAX_REFERENCE_IMAGES,
            "Too many reference images, extra images dropped",
        );
    }
    ProviderRequest {
        system_instruction,
        contents,
    }
}

fn finish(
    output: GenerationOutput,
    attempts: usize,
    last_error: Option<PipelineError>,
) -> Result<GenerationOutput, PipelineError> {
    if output.image_count() > 0 {
        return Ok(output);
    }
    let reason = last_error.map_or_else(|| "no attempts were made".to_string(), |e| e.to_string());
    Err(PipelineError::GenerationFailed(format!(
        "All image generations failed ({attempts} attempt(s)): {reason}"
    )))
}

// ---------------------------------------------------------------------------
// Gemini provider
// ---------------------------------------------------------------------------

/// [`ImageProvider`] backed by the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiImageProvider {
    api: GeminiApi,
}

impl GeminiImageProvider {
    pub fn new(api: GeminiApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, PipelineError> {
        let wire = GenerateContentRequest {
            contents: request.contents.clone(),
            system_instruction: Some(Content::system(request.system_instruction.clone())),
            generation_config: Some(GenerationConfig::image_output()),
        };

        let response = self.api.generate_content(&wire).await?;
        ensure_candidates(&response)?;

        let images = extract_images(&response)?;
        if images.is_empty() {
            let finish_reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(GeminiApiError::MalformedResponse(format!(
                "no image in response (finish reason {finish_reason})"
            ))
            .into());
        }

        Ok(ProviderResponse {
            images,
            signatures: extract_signatures(&response),
        })
    }
}
