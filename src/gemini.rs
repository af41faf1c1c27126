//! Gemini `generateContent` backend.

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::GeminiConfig;
use crate::gateway::{BackendError, GenerationRequest, ListingBackend};

pub struct GeminiBackend {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, BackendError> {
        if config.api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; listing generation will fail until it is configured");
        }
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint,
            utf8_percent_encode(&self.config.model, MODEL_ESCAPE)
        )
    }
}

// Model names look like `gemini-2.5-flash`; keep `-`, `.` and `_` readable.
const MODEL_ESCAPE: &percent_encoding::AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

#[async_trait]
impl ListingBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(BackendError::MissingApiKey)?;
        let payload = make_request_payload(request);
        debug!(model = %self.config.model, "sending generateContent request");

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| BackendError::Transport(format!("failed to read response: {err}")))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| body.trim().to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(message),
                _ => BackendError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }
        parse_response_text(&body)
    }
}

/// Builds the `generateContent` body: one user turn plus JSON response mode.
pub fn make_request_payload(request: &GenerationRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema,
        }
    })
}

/// Extracts the first text part of the first candidate.
pub fn parse_response_text(body: &str) -> Result<String, BackendError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| BackendError::Transport(format!("failed to parse response JSON: {e}")))?;

    if let Some(message) = v.get("error").map(|error| {
        error["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string()
    }) {
        return Err(BackendError::Status {
            status: v["error"]["code"].as_u64().unwrap_or(0) as u16,
            message,
        });
    }

    v["candidates"][0]["content"]["parts"]
        .as_array()
        .and_then(|parts| parts.iter().find_map(|part| part["text"].as_str()))
        .map(|text| text.to_string())
        .ok_or(BackendError::EmptyResponse)
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{build_prompt, listing_schema};

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: build_prompt("handmade leather tote"),
            schema: listing_schema().clone(),
        }
    }

    #[test]
    fn payload_uses_json_response_mode() {
        let payload = make_request_payload(&request());
        let contents = payload["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert!(
            contents[0]["parts"][0]["text"]
                .as_str()
                .unwrap()
                .contains("handmade leather tote")
        );
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            payload["generationConfig"]["responseSchema"]["required"]
                .as_array()
                .unwrap()
                .len(),
            5
        );
    }

    #[test]
    fn response_text_comes_from_first_candidate() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"title\":\"x\"}"}]}}]}"#;
        assert_eq!(parse_response_text(body).unwrap(), r#"{"title":"x"}"#);
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        let body = r#"{"candidates":[]}"#;
        assert!(matches!(
            parse_response_text(body),
            Err(BackendError::EmptyResponse)
        ));
    }

    #[test]
    fn error_payload_is_surfaced() {
        let body = r#"{"error":{"code":429,"message":"Resource exhausted"}}"#;
        match parse_response_text(body) {
            Err(BackendError::Status { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "Resource exhausted");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn url_includes_model() {
        let backend = GeminiBackend::new(
            GeminiConfig::default()
                .with_api_key("k")
                .with_endpoint("http://127.0.0.1:1/v1beta/"),
        )
        .unwrap();
        assert_eq!(
            backend.url(),
            "http://127.0.0.1:1/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let backend = GeminiBackend::new(
            GeminiConfig::default().with_endpoint("http://127.0.0.1:1"),
        )
        .unwrap();
        let err = backend.complete(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingApiKey));
    }
}
