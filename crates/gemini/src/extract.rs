//! Reduce a raw response to image bytes and continuation signatures.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use mockup_core::signature::ThoughtSignatures;

use crate::api::GeminiApiError;
use crate::messages::GenerateContentResponse;

/// Decode every inline image across all candidates, in response order.
pub fn extract_images(response: &GenerateContentResponse) -> Result<Vec<Vec<u8>>, GeminiApiError> {
    let mut images = Vec::new();

    for candidate in &response.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in &content.parts {
            let Some(inline) = &part.inline_data else {
                continue;
            };
            if inline.data.is_empty() {
                continue;
            }
            let bytes = BASE64
                .decode(inline.data.as_bytes())
                .map_err(|e| GeminiApiError::Decode(format!("inline image is not valid base64: {e}")))?;
            images.push(bytes);
        }
    }

    Ok(images)
}

/// Reject a response that cannot contain an image.
///
/// An empty candidate list usually means the prompt was blocked; the
/// provider's feedback is carried in the error message.
pub fn ensure_candidates(response: &GenerateContentResponse) -> Result<(), GeminiApiError> {
    if !response.candidates.is_empty() {
        return Ok(());
    }
    let reason = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
        .unwrap_or("no candidates returned");
    Err(GeminiApiError::MalformedResponse(reason.to_string()))
}

/// Collect thought signatures from the first candidate.
///
/// The signature on part 0 is the text signature. Every part carrying
/// inline data contributes its signature to the image list.
pub fn extract_signatures(response: &GenerateContentResponse) -> ThoughtSignatures {
    let mut signatures = ThoughtSignatures::default();

    let parts = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();

    for (index, part) in parts.iter().enumerate() {
        let Some(signature) = &part.thought_signature else {
            continue;
        };
        if index == 0 {
            signatures.text_signature = Some(signature.clone());
        }
        if part.inline_data.is_some() {
            signatures.image_signatures.push(signature.clone());
        }
    }

    signatures
}
