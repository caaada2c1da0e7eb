//! Generation modes, request inputs, and output file layout.
//!
//! Pure validation and naming helpers shared by the dispatcher, the worker,
//! and the HTTP layer. Nothing here touches the database or the filesystem.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of images generated when the request does not say otherwise.
pub const DEFAULT_OUTPUT_COUNT: u8 = 2;

/// Upper bound on images generated for a single request.
pub const MAX_OUTPUT_COUNT: u8 = 4;

/// Lower bound on images generated for a single request.
pub const MIN_OUTPUT_COUNT: u8 = 1;

/// Maximum number of reference images attached to one provider call.
pub const MAX_REFERENCE_IMAGES: usize = 14;

/// Maximum length of the free-form user prompt, in characters.
pub const MAX_PROMPT_LENGTH: usize = 2_000;

/// Maximum length of a partial-edit instruction, in characters.
pub const MAX_EDIT_PROMPT_LENGTH: usize = 500;

/// Default wall-clock budget for one generation job, in seconds.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

/// Edge length of the square JPEG thumbnail stored next to each output.
pub const THUMBNAIL_SIZE: u32 = 200;

/// JPEG quality used for thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 80;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// What kind of mockup a generation request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Swap the character printed on an existing product photo.
    IpChange,
    /// Turn a 2D sketch into a photorealistic product render.
    SketchToReal,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::IpChange => "ip_change",
            GenerationMode::SketchToReal => "sketch_to_real",
        }
    }

    /// Parse the database / wire representation.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "ip_change" => Ok(GenerationMode::IpChange),
            "sketch_to_real" => Ok(GenerationMode::SketchToReal),
            other => Err(CoreError::Validation(format!(
                "Unknown generation mode '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// File references and free text captured when a request is created.
///
/// Stored verbatim in the `prompt_data` JSONB column so that regenerate can
/// rebuild an identical request without consulting any other table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    /// Set on requests created by a partial edit of an earlier image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<EditInputs>,
}

/// A partial edit of one image produced by an earlier request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditInputs {
    pub source_generation_id: DbId,
    pub image_path: String,
    pub edit_prompt: String,
}

/// Trim an edit instruction and check it is 1 to [`MAX_EDIT_PROMPT_LENGTH`]
/// characters long.
pub fn validate_edit_prompt(prompt: &str) -> Result<String, CoreError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Edit prompt is required".to_string()));
    }
    let len = trimmed.chars().count();
    if len > MAX_EDIT_PROMPT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Edit prompt exceeds maximum length of {MAX_EDIT_PROMPT_LENGTH} characters (got {len})"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate the optional free-form prompt length.
pub fn validate_prompt(prompt: Option<&str>) -> Result<(), CoreError> {
    if let Some(text) = prompt {
        let len = text.chars().count();
        if len > MAX_PROMPT_LENGTH {
            return Err(CoreError::Validation(format!(
                "Prompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters (got {len})"
            )));
        }
    }
    Ok(())
}

/// Check that every image a mode requires is present.
///
/// `ip_change` needs a source and a character image. `sketch_to_real` needs
/// the sketch (source); the texture image stays optional.
pub fn validate_inputs(mode: GenerationMode, inputs: &GenerationInputs) -> Result<(), CoreError> {
    if is_blank(inputs.source_image_path.as_deref()) {
        return Err(CoreError::Validation(match mode {
            GenerationMode::IpChange => "IP change requires a source image".to_string(),
            GenerationMode::SketchToReal => "Sketch to real requires a sketch image".to_string(),
        }));
    }
    if mode == GenerationMode::IpChange && is_blank(inputs.character_image_path.as_deref()) {
        return Err(CoreError::Validation(
            "IP change requires a character image".to_string(),
        ));
    }
    if let Some(edit) = &inputs.edit {
        if is_blank(Some(&edit.image_path)) {
            return Err(CoreError::Validation("Edit requires an image to modify".to_string()));
        }
        validate_edit_prompt(&edit.edit_prompt)?;
    }
    validate_prompt(inputs.user_prompt.as_deref())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Output layout
// ---------------------------------------------------------------------------

/// Directory (relative to the storage root) holding a generation's outputs.
pub fn output_dir(owner_id: DbId, project_id: DbId, generation_id: DbId) -> String {
    format!("generations/{owner_id}/{project_id}/{generation_id}")
}

/// File name for output `index` (0-based) written during delivery `attempt`.
///
/// Each attempt gets its own prefix so a retried job never overwrites the
/// files of an earlier partial run.
pub fn output_file_name(attempt: u32, index: usize) -> String {
    format!("output_a{attempt}_{}.png", index + 1)
}

/// Thumbnail name paired with [`output_file_name`].
pub fn thumbnail_file_name(attempt: u32, index: usize) -> String {
    format!("thumb_output_a{attempt}_{}.jpg", index + 1)
}
