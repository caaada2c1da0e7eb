//! REST client for the Gemini image model.
//!
//! Wraps `POST {api_base}/models/{model}:generateContent` using [`reqwest`].

use std::time::Duration;

use crate::messages::{GenerateContentRequest, GenerateContentResponse};

/// Public Gemini REST base URL.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Image model used for every mockup generation.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// HTTP client for the Gemini API.
#[derive(Clone)]
pub struct GeminiApi {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

/// Errors from the Gemini REST layer.
#[derive(Debug, thiserror::Error)]
pub enum GeminiApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Gemini returned a non-2xx status code.
    #[error("Gemini API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A payload inside an otherwise valid response could not be decoded.
    #[error("Failed to decode response payload: {0}")]
    Decode(String),

    /// The response decoded but carries nothing usable (no candidates,
    /// blocked prompt, or no image part).
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl GeminiApi {
    /// Create a client for `model` at `api_base`.
    ///
    /// `request_timeout` bounds every call, so a stalled provider surfaces
    /// as [`GeminiApiError::Request`] instead of hanging the worker.
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, GeminiApiError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, api_base, api_key, model))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full endpoint URL for the configured model.
    pub fn endpoint(&self) -> String {
        let model = self.model.trim();
        let path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{path}:generateContent", self.api_base)
    }

    /// Send one `generateContent` call.
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiApiError> {
        tracing::debug!(
            model = %self.model,
            turns = request.contents.len(),
            "Sending generateContent request",
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GeminiApiError::ApiError`]
    /// carrying the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GeminiApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GeminiApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GeminiApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::messages::{Content, Part};

    fn api(base: &str, model: &str) -> GeminiApi {
        GeminiApi::with_client(reqwest::Client::new(), base, "key", model)
    }

    #[test]
    fn endpoint_prefixes_models_path() {
        let api = api("https://example.test/v1beta/", DEFAULT_IMAGE_MODEL);
        assert_eq!(
            api.endpoint(),
            "https://example.test/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
    }

    #[test]
    fn endpoint_keeps_explicit_models_path() {
        let api = api("https://example.test", "models/custom");
        assert_eq!(api.endpoint(), "https://example.test/models/custom:generateContent");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let api = GeminiApi::new(
            "http://127.0.0.1:1",
            "key",
            DEFAULT_IMAGE_MODEL,
            Duration::from_secs(2),
        )
        .unwrap();
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("hi")])],
            system_instruction: None,
            generation_config: None,
        };

        assert_matches!(
            api.generate_content(&request).await,
            Err(GeminiApiError::Request(_))
        );
    }
}
