//! Thought signatures: opaque provider tokens replayed to continue a turn.

use serde::{Deserialize, Serialize};

/// Token accepted by the provider in place of a real signature.
pub const SIGNATURE_BYPASS: &str = "context_engineering_is_the_way_to_go";

/// Signatures extracted from a single provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtSignatures {
    /// Signature carried by the first (textual) part of the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_signature: Option<String>,
    /// One signature per inline image part, in response order.
    #[serde(default)]
    pub image_signatures: Vec<String>,
}

impl ThoughtSignatures {
    pub fn is_empty(&self) -> bool {
        self.text_signature.is_none() && self.image_signatures.is_empty()
    }
}

/// The pair of tokens replayed in the model turn of a continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationTokens {
    pub text: String,
    pub image: String,
}

/// Return `signature` unless it is missing or blank, else the bypass token.
pub fn ensure_signature(signature: Option<&str>) -> &str {
    match signature {
        Some(s) if !s.trim().is_empty() => s,
        _ => SIGNATURE_BYPASS,
    }
}

/// Where an image's tokens were recorded: the response turn that produced
/// it and the image's slot within that response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureSlot {
    pub turn: usize,
    pub slot: usize,
}

/// Resolve the tokens replayed next to one parent image.
///
/// `turns` are the stored records indexed by turn. Both tokens come from the
/// record that produced the image, so an image is never paired with the
/// signature of another response. An image without a recorded slot, or
/// whose turn is gone, replays the bypass token for both.
pub fn resolve_continuation(turns: &[ThoughtSignatures], slot: Option<SignatureSlot>) -> ContinuationTokens {
    let Some((turn, slot)) = slot.and_then(|s| turns.get(s.turn).map(|t| (t, s.slot))) else {
        return ContinuationTokens {
            text: SIGNATURE_BYPASS.to_string(),
            image: SIGNATURE_BYPASS.to_string(),
        };
    };

    ContinuationTokens {
        text: ensure_signature(turn.text_signature.as_deref()).to_string(),
        image: ensure_signature(turn.image_signatures.get(slot).map(String::as_str)).to_string(),
    }
}
