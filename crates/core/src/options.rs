//! Versioned generation options and the migration from legacy shapes.
//!
//! [`GenerationOptions`] is the only options type the pipeline works with.
//! Request bodies are first decoded into [`RawGenerationOptions`], which also
//! accepts the older flag names, and then normalized by [`migrate_options`].
//!
//! | Legacy field            | Canonical field          |
//! |-------------------------|--------------------------|
//! | `fixedViewpoint`        | `viewpointLock`          |
//! | `fixedBackground`       | `whiteBackground`        |
//! | `transparentBackground` | `whiteBackground`        |
//! | `preserveHardware`      | `accessoryPreservation`  |
//!
//! An explicit canonical field always wins over its legacy aliases. When
//! only aliases are present, any `true` alias enables the option.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::generation::{DEFAULT_OUTPUT_COUNT, MAX_OUTPUT_COUNT, MIN_OUTPUT_COUNT};
use crate::hardware_spec::{parse_hardware_specs, HardwareSpecItem};
use crate::prompt::PromptOptions;

/// Current schema version written into every stored options blob.
pub const OPTIONS_VERSION: u32 = 3;

/// Maximum length of server-level user instructions, in characters.
pub const MAX_INSTRUCTIONS_LENGTH: usize = 2_000;

// ---------------------------------------------------------------------------
// Canonical options
// ---------------------------------------------------------------------------

/// Canonical, versioned options stored with every generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub viewpoint_lock: bool,
    #[serde(default)]
    pub white_background: bool,
    #[serde(default)]
    pub accessory_preservation: bool,
    #[serde(default)]
    pub remove_shadows: bool,
    #[serde(default)]
    pub preserve_structure: bool,
    #[serde(default)]
    pub style_copy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub user_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub hardware_spec_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_specs: Option<Vec<HardwareSpecItem>>,
    #[serde(default = "default_output_count")]
    #[validate(range(min = 1, max = 4))]
    pub output_count: u8,
}

fn current_version() -> u32 {
    OPTIONS_VERSION
}

fn default_output_count() -> u8 {
    DEFAULT_OUTPUT_COUNT
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            version: OPTIONS_VERSION,
            viewpoint_lock: false,
            white_background: false,
            accessory_preservation: false,
            remove_shadows: false,
            preserve_structure: false,
            style_copy: false,
            user_instructions: None,
            hardware_spec_input: None,
            hardware_specs: None,
            output_count: DEFAULT_OUTPUT_COUNT,
        }
    }
}

impl GenerationOptions {
    /// Decode a request body (canonical or legacy shape), migrate and validate.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        let raw: RawGenerationOptions = serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Invalid generation options: {e}")))?;
        let options = migrate_options(raw);
        options.validate()?;
        Ok(options)
    }

    /// Apply field-level overrides on top of these options.
    ///
    /// Fields absent from `overrides` keep their current value.
    pub fn with_overrides(&self, overrides: RawGenerationOptions) -> Result<Self, CoreError> {
        let options = migrate_onto(self.clone(), overrides);
        options.validate()?;
        Ok(options)
    }

    /// Subset consumed by the prompt composer.
    pub fn prompt_options(&self) -> PromptOptions {
        PromptOptions {
            viewpoint_lock: self.viewpoint_lock,
            white_background: self.white_background,
            accessory_preservation: self.accessory_preservation,
            style_copy: self.style_copy,
            user_instructions: self.user_instructions.clone(),
        }
    }

    /// Hardware items to preserve: pre-structured items win over free text.
    pub fn resolved_hardware_specs(&self) -> Vec<HardwareSpecItem> {
        if let Some(items) = self.hardware_specs.as_ref().filter(|i| !i.is_empty()) {
            return items.clone();
        }
        match self.hardware_spec_input.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => parse_hardware_specs(text),
            _ => Vec::new(),
        }
    }

    /// Number of provider calls to make, clamped to the supported range.
    pub fn effective_output_count(&self) -> usize {
        usize::from(self.output_count.clamp(MIN_OUTPUT_COUNT, MAX_OUTPUT_COUNT))
    }
}

// ---------------------------------------------------------------------------
// Raw input + migration
// ---------------------------------------------------------------------------

/// Options exactly as received at the boundary, canonical and legacy names
/// side by side. Every field is optional; unknown fields are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawGenerationOptions {
    pub version: Option<u32>,
    pub viewpoint_lock: Option<bool>,
    pub white_background: Option<bool>,
    pub accessory_preservation: Option<bool>,
    pub remove_shadows: Option<bool>,
    pub preserve_structure: Option<bool>,
    pub style_copy: Option<bool>,
    pub user_instructions: Option<String>,
    pub hardware_spec_input: Option<String>,
    pub hardware_specs: Option<Vec<HardwareSpecItem>>,
    pub output_count: Option<u8>,

    // Legacy aliases.
    pub fixed_viewpoint: Option<bool>,
    pub fixed_background: Option<bool>,
    pub transparent_background: Option<bool>,
    pub preserve_hardware: Option<bool>,
}

impl RawGenerationOptions {
    /// Decode an override body without applying defaults.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Invalid generation options: {e}")))
    }
}

/// Normalize raw input into canonical options with default values.
pub fn migrate_options(raw: RawGenerationOptions) -> GenerationOptions {
    migrate_onto(GenerationOptions::default(), raw)
}

fn migrate_onto(base: GenerationOptions, raw: RawGenerationOptions) -> GenerationOptions {
    GenerationOptions {
        version: OPTIONS_VERSION,
        viewpoint_lock: resolve_flag(raw.viewpoint_lock, &[raw.fixed_viewpoint], base.viewpoint_lock),
        white_background: resolve_flag(
            raw.white_background,
            &[raw.fixed_background, raw.transparent_background],
            base.white_background,
        ),
        accessory_preservation: resolve_flag(
            raw.accessory_preservation,
            &[raw.preserve_hardware],
            base.accessory_preservation,
        ),
        remove_shadows: raw.remove_shadows.unwrap_or(base.remove_shadows),
        preserve_structure: raw.preserve_structure.unwrap_or(base.preserve_structure),
        style_copy: raw.style_copy.unwrap_or(base.style_copy),
        user_instructions: raw.user_instructions.or(base.user_instructions),
        hardware_spec_input: raw.hardware_spec_input.or(base.hardware_spec_input),
        hardware_specs: raw.hardware_specs.or(base.hardware_specs),
        output_count: raw.output_count.unwrap_or(base.output_count),
    }
}

fn resolve_flag(canonical: Option<bool>, aliases: &[Option<bool>], fallback: bool) -> bool {
    if let Some(value) = canonical {
        return value;
    }
    let given: Vec<bool> = aliases.iter().flatten().copied().collect();
    if given.is_empty() {
        fallback
    } else {
        given.into_iter().any(|v| v)
    }
}
