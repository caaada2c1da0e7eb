//! Free-text hardware specification parser.
//!
//! Turns loosely formatted descriptions of small product components
//! ("Zipper: brass, gold, top edge") into ordered [`HardwareSpecItem`]s and
//! renders them back as a numbered prompt block.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of hardware component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareType {
    Zipper,
    Ring,
    Buckle,
    Patch,
    Button,
    Other,
}

impl HardwareType {
    /// Human-readable label used in prompt text.
    pub fn label(self) -> &'static str {
        match self {
            HardwareType::Zipper => "Zipper",
            HardwareType::Ring => "Metal ring",
            HardwareType::Buckle => "Buckle",
            HardwareType::Patch => "Leather patch",
            HardwareType::Button => "Button",
            HardwareType::Other => "Other hardware",
        }
    }
}

/// One parsed hardware component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSpecItem {
    #[serde(rename = "type")]
    pub kind: HardwareType,
    pub material: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Leading bullets and dashes in front of a line.
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[•·\-\*\s]+").expect("valid regex"));

/// A `label:` prefix, accepting the full-width colon as well.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:：]+[:：]\s*").expect("valid regex"));

/// Synonyms per type, checked in order against the lowercased line.
const TYPE_SYNONYMS: &[(HardwareType, &[&str])] = &[
    (HardwareType::Zipper, &["zipper", "zip", "지퍼"]),
    (HardwareType::Ring, &["d-ring", "o-ring", "ring", "고리", "링"]),
    (HardwareType::Buckle, &["buckle", "버클"]),
    (HardwareType::Patch, &["patch", "패치"]),
    (HardwareType::Button, &["button", "snap", "버튼", "단추"]),
];

/// Detect the hardware type mentioned in a line, if any.
pub fn detect_hardware_type(line: &str) -> Option<HardwareType> {
    let lower = line.to_lowercase();
    TYPE_SYNONYMS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
}

/// Parse free text into hardware items, preserving input order.
///
/// Lines are separated by newlines or semicolons. A line that mentions no
/// known hardware type still becomes an [`HardwareType::Other`] item as long
/// as it carries at least one field.
pub fn parse_hardware_specs(input: &str) -> Vec<HardwareSpecItem> {
    input
        .split(['\n', ';'])
        .map(|line| BULLET_RE.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .filter_map(|line| parse_line(&line))
        .collect()
}

fn parse_line(line: &str) -> Option<HardwareSpecItem> {
    let kind = detect_hardware_type(line);

    let stripped = LABEL_RE.replace(line, "");
    let stripped = stripped.trim();
    let payload = if stripped.is_empty() { line } else { stripped };

    let tokens: Vec<&str> = payload
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if kind.is_none() && tokens.is_empty() {
        return None;
    }

    let field = |i: usize| tokens.get(i).map(|t| t.to_string()).unwrap_or_default();

    Some(HardwareSpecItem {
        kind: kind.unwrap_or(HardwareType::Other),
        material: tokens
            .first()
            .map(|t| t.to_string())
            .unwrap_or_else(|| payload.to_string()),
        color: field(1),
        position: field(2),
        size: tokens.get(3).map(|t| t.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render items as a numbered "detected hardware" block.
///
/// Returns `None` for an empty list so callers emit nothing at all.
pub fn render_hardware_details(items: &[HardwareSpecItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }

    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let attributes: Vec<&str> = [
                Some(item.material.as_str()),
                Some(item.color.as_str()),
                Some(item.position.as_str()),
                item.size.as_deref(),
            ]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();

            let description = if attributes.is_empty() {
                "no details provided".to_string()
            } else {
                attributes.join(", ")
            };
            format!("{}. {}: {description}", i + 1, item.kind.label())
        })
        .collect();

    Some(format!(
        "## Detected hardware details\n{}\n\nEvery item above must keep its original material, color, position and shape.",
        lines.join("\n")
    ))
}
