//! Prompt composer: named options to an ordered instruction block.
//!
//! Output is deterministic. Blocks are always emitted in
//! [`PromptOption::CANONICAL_ORDER`] regardless of how the options were
//! supplied, and the same input always produces byte-identical text.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::options::MAX_INSTRUCTIONS_LENGTH;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of user instructions typed into the UI, in characters.
pub const MAX_UI_INSTRUCTIONS_LENGTH: usize = 500;

const VIEWPOINT_LOCK_LINES: &[&str] = &[
    "Keep the exact same camera angle, perspective, and viewpoint as the original image",
    "Do not change the product's orientation or angle",
];

const WHITE_BACKGROUND_LINES: &[&str] = &[
    "The background must be pure white with no shadows",
    "Clean, studio-lit product photograph on white background",
];

const ACCESSORY_PRESERVATION_LINES: &[&str] = &[
    "CRITICAL: Keep all accessories (zippers, key rings, buttons, buckles) exactly as shown in the original",
    "Preserve the exact colors and shapes of all hardware and decorative elements",
    "Do not modify, add, or remove any accessory details",
];

const STYLE_COPY_LINES: &[&str] = &[
    "Maintain the exact same material texture, color tone, and accessory details from the reference image",
    "Only change the character while preserving all other visual elements",
];

const BLOCK_SEPARATOR: &str = "\n\n";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A recognized composer option. Serializes to its camelCase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptOption {
    ViewpointLock,
    WhiteBackground,
    AccessoryPreservation,
    StyleCopy,
    UserInstructions,
}

impl PromptOption {
    /// Order in which blocks are appended.
    pub const CANONICAL_ORDER: [PromptOption; 5] = [
        PromptOption::ViewpointLock,
        PromptOption::WhiteBackground,
        PromptOption::AccessoryPreservation,
        PromptOption::StyleCopy,
        PromptOption::UserInstructions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PromptOption::ViewpointLock => "viewpointLock",
            PromptOption::WhiteBackground => "whiteBackground",
            PromptOption::AccessoryPreservation => "accessoryPreservation",
            PromptOption::StyleCopy => "styleCopy",
            PromptOption::UserInstructions => "userInstructions",
        }
    }
}

/// Composer input.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PromptOptions {
    #[serde(default)]
    pub viewpoint_lock: bool,
    #[serde(default)]
    pub white_background: bool,
    #[serde(default)]
    pub accessory_preservation: bool,
    #[serde(default)]
    pub style_copy: bool,
    #[serde(default)]
    pub user_instructions: Option<String>,
}

/// Composer output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResult {
    pub text: String,
    pub applied_options: Vec<PromptOption>,
}

impl PromptResult {
    /// Names of the applied options, in canonical order.
    pub fn applied_option_names(&self) -> Vec<&'static str> {
        self.applied_options.iter().map(|o| o.name()).collect()
    }
}

/// Result of [`compose_safe`]: never fails, reports the problem instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafePromptResult {
    #[serde(flatten)]
    pub result: PromptResult,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Compose with the UI instruction limit.
pub fn compose(options: &PromptOptions) -> Result<PromptResult, CoreError> {
    compose_with_limit(options, MAX_UI_INSTRUCTIONS_LENGTH)
}

/// Compose with the server-level instruction limit.
pub fn compose_server(options: &PromptOptions) -> Result<PromptResult, CoreError> {
    compose_with_limit(options, MAX_INSTRUCTIONS_LENGTH)
}

/// Compose, rejecting user instructions longer than `max_instruction_chars`.
pub fn compose_with_limit(
    options: &PromptOptions,
    max_instruction_chars: usize,
) -> Result<PromptResult, CoreError> {
    if let Some(text) = &options.user_instructions {
        let len = text.chars().count();
        if len > max_instruction_chars {
            return Err(CoreError::Validation(format!(
                "userInstructions exceeds maximum length of {max_instruction_chars} characters (got {len})"
            )));
        }
    }

    let mut blocks = Vec::new();
    let mut applied_options = Vec::new();

    for option in PromptOption::CANONICAL_ORDER {
        if let Some(block) = block_for(option, options) {
            blocks.push(block);
            applied_options.push(option);
        }
    }

    Ok(PromptResult {
        text: blocks.join(BLOCK_SEPARATOR),
        applied_options,
    })
}

/// Decode an untyped option bag and compose it.
///
/// Unknown keys, wrong value types and over-long text are reported as
/// [`CoreError::Validation`] rather than coerced.
pub fn compose_json(value: &serde_json::Value) -> Result<PromptResult, CoreError> {
    let options: PromptOptions = serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Validation(format!("Invalid prompt options: {e}")))?;
    compose(&options)
}

/// Like [`compose_json`] but returns an empty result plus an error message.
pub fn compose_safe(value: &serde_json::Value) -> SafePromptResult {
    match compose_json(value) {
        Ok(result) => SafePromptResult {
            result,
            success: true,
            error: None,
        },
        Err(e) => SafePromptResult {
            result: PromptResult::default(),
            success: false,
            error: Some(e.to_string()),
        },
    }
}

fn block_for(option: PromptOption, options: &PromptOptions) -> Option<String> {
    match option {
        PromptOption::ViewpointLock => lines_if(options.viewpoint_lock, VIEWPOINT_LOCK_LINES),
        PromptOption::WhiteBackground => lines_if(options.white_background, WHITE_BACKGROUND_LINES),
        PromptOption::AccessoryPreservation => {
            lines_if(options.accessory_preservation, ACCESSORY_PRESERVATION_LINES)
        }
        PromptOption::StyleCopy => lines_if(options.style_copy, STYLE_COPY_LINES),
        PromptOption::UserInstructions => options
            .user_instructions
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("Additional instructions: {t}")),
    }
}

fn lines_if(enabled: bool, lines: &[&str]) -> Option<String> {
    enabled.then(|| sentence_block(lines))
}

fn sentence_block(lines: &[&str]) -> String {
    format!("{}.", lines.join(". "))
}
