//! System prompts sent alongside every provider call.
//!
//! Each builder starts from a fixed per-mode base, adds the mode-specific
//! constraint sections, and finishes with the composed option block from
//! [`crate::prompt`].

use crate::error::CoreError;
use crate::hardware_spec::render_hardware_details;
use crate::options::GenerationOptions;
use crate::prompt::compose_server;

const IP_CHANGE_BASE: &str = "\
You are an expert at producing product mockup images.
Replace the existing character or IP on the given product photo with the new character so the result looks like a real manufactured product.

Core requirements:
1. Keep the physical shape and construction of the product exactly as it is
2. Apply the new character without distorting its proportions or silhouette
3. Keep the material feel and lighting of the original product
4. Reproduce the character's colors and details faithfully";

const SKETCH_TO_REAL_BASE: &str = "\
You are an expert at turning 2D sketches into real product photographs.
Convert the given sketch into a high-quality, photorealistic render of a manufactured product.

Core requirements:
1. Keep the shape and proportions of the sketch exactly
2. Apply realistic materials that look like a finished product
3. Add natural lighting and shadows
4. Deliver product-photography quality output";

const PRESERVE_STRUCTURE_LINE: &str = "5. Preserving the original structure takes priority over everything else";

const REMOVE_SHADOWS_BLOCK: &str = "\
## Shadow removal
MUST: remove every shadow
MUST NOT: apply drop shadows or soft shadows";

const HARDWARE_MATRIX_BLOCK: &str = "\
## Hardware preservation matrix
| Component | Locked attributes | Lock level |
|-----------|-------------------|------------|
| Zipper | color, position, length, teeth | LOCKED |
| Metal ring (D/O-ring) | material, finish, size, position | LOCKED |
| Buckle | shape, material, construction, position | LOCKED |
| Leather patch | position, size, texture, embossing | LOCKED |

Rules:
MUST NOT: change hardware color
MUST NOT: move hardware
MUST NOT: resize hardware
MUST NOT: change hardware shape or construction
MUST NOT: remove or add hardware";

const STYLE_COPY_ROLES: &str = "\
You are continuing a previous mockup generation. Three images are involved:
- STYLE REFERENCE: the previously generated mockup. Copy its material, texture, color tone, lighting and accessories.
- SOURCE STRUCTURE: the original product photo. Its shape and layout define the product.
- NEW CHARACTER: the character that must replace the one shown in the style reference.";

const STYLE_COPY_PRESERVE_CHECKLIST: &str = "\
## Must preserve (non-negotiable)
- Product silhouette and proportions
- Material and surface texture
- Color tone and lighting
- Every accessory and hardware item, in place
- Camera angle and framing";

const STYLE_COPY_DO_NOT_MODIFY: &str = "\
## Do not modify
- Background
- Product edges, seams and stitching
- Hardware color, position or size
- Anything other than the character artwork";

const EDIT_BASE: &str = "\
You are an image editing expert.
Modify only the part of the given image that the user asks for and leave everything else untouched.

Rules:
- Change only the requested part
- Keep every other region pixel-identical
- Keep the overall style and lighting consistent";

/// System prompt for a partial edit of one image. Stored options do not
/// apply; the edit request itself travels in the user turn.
pub fn edit_system_prompt() -> &'static str {
    EDIT_BASE
}

/// System prompt for the `ip_change` mode.
pub fn ip_change_system_prompt(options: &GenerationOptions) -> Result<String, CoreError> {
    let mut sections = vec![base_with_structure(IP_CHANGE_BASE, options)];
    push_constraint_sections(&mut sections, options);
    push_option_block(&mut sections, options)?;
    Ok(sections.join("\n\n"))
}

/// System prompt for the `sketch_to_real` mode.
pub fn sketch_to_real_system_prompt(options: &GenerationOptions) -> Result<String, CoreError> {
    let mut sections = vec![base_with_structure(SKETCH_TO_REAL_BASE, options)];
    push_constraint_sections(&mut sections, options);
    push_option_block(&mut sections, options)?;
    Ok(sections.join("\n\n"))
}

/// System prompt for a style-copy continuation.
///
/// Always includes the style-copy option block, even if the stored options
/// of the request did not set it.
pub fn style_copy_system_prompt(options: &GenerationOptions) -> Result<String, CoreError> {
    let forced = GenerationOptions {
        style_copy: true,
        ..options.clone()
    };

    let mut sections = vec![
        STYLE_COPY_ROLES.to_string(),
        STYLE_COPY_PRESERVE_CHECKLIST.to_string(),
        STYLE_COPY_DO_NOT_MODIFY.to_string(),
    ];
    push_constraint_sections(&mut sections, &forced);
    push_option_block(&mut sections, &forced)?;
    Ok(sections.join("\n\n"))
}

fn base_with_structure(base: &str, options: &GenerationOptions) -> String {
    if options.preserve_structure {
        format!("{base}\n{PRESERVE_STRUCTURE_LINE}")
    } else {
        base.to_string()
    }
}

fn push_constraint_sections(sections: &mut Vec<String>, options: &GenerationOptions) {
    if options.remove_shadows {
        sections.push(REMOVE_SHADOWS_BLOCK.to_string());
    }

    if options.accessory_preservation {
        if let Some(details) = render_hardware_details(&options.resolved_hardware_specs()) {
            sections.push(HARDWARE_MATRIX_BLOCK.to_string());
            sections.push(details);
        }
    }
}

fn push_option_block(sections: &mut Vec<String>, options: &GenerationOptions) -> Result<(), CoreError> {
    let composed = compose_server(&options.prompt_options())?;
    if !composed.text.is_empty() {
        sections.push(composed.text);
    }
    Ok(())
}
