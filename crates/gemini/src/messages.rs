//! Wire types for `models/{model}:generateContent`.
//!
//! Field names follow the REST API (camelCase). Unknown response fields are
//! ignored so new provider fields never break decoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// MIME type used for every image we send.
pub const PNG_MIME: &str = "image/png";

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some(Role::User),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some(Role::Model),
            parts,
        }
    }

    /// A role-less text content, as used for `systemInstruction`.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

/// Base64-encoded binary payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// A single part of a turn: text, inline data, or both with a signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// An inline PNG part built from raw bytes.
    pub fn png(bytes: &[u8]) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: PNG_MIME.to_string(),
                data: BASE64.encode(bytes),
            }),
            ..Default::default()
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.thought_signature = Some(signature.into());
        self
    }
}

/// Image output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: "1:1".to_string(),
            image_size: "2K".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

impl GenerationConfig {
    /// Text + image output at the default square 2K size.
    pub fn image_output() -> Self {
        Self {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            image_config: Some(ImageConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::png(&[1, 2, 3]),
                Part::text("swap the character"),
            ])],
            system_instruction: Some(Content::system("be precise")),
            generation_config: Some(GenerationConfig::image_output()),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["contents"][0]["parts"][0]["inlineData"]["data"], "AQID");
        assert_eq!(value["contents"][0]["parts"][1]["text"], "swap the character");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
        assert_eq!(value["generationConfig"]["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn signature_is_serialized_on_the_part() {
        let part = Part::text("done").with_signature("sig-1");
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value, json!({ "text": "done", "thoughtSignature": "sig-1" }));
    }

    #[test]
    fn response_ignores_unknown_fields() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "hi" }] },
                "finishReason": "STOP",
                "safetyRatings": []
            }],
            "usageMetadata": { "totalTokenCount": 10 }
        }))
        .unwrap();

        assert_eq!(response.candidates.len(), 1);
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn empty_response_decodes() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.candidates.is_empty());
    }
}
