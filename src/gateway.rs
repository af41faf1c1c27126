//! Listing Request Gateway
//!
//! Turns a free-text product description into a validated [`ListingData`].
//! The gateway owns the prompt and the output schema; the actual model call
//! goes through a [`ListingBackend`], which keeps the service boundary
//! swappable (Gemini in production, a stub in tests).

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::listing::{
    DESCRIPTION_CHAR_LIMIT, KEYWORD_CHAR_LIMIT, ListingData, TARGET_KEYWORD_COUNT,
    TARGET_MATERIAL_COUNT, TITLE_CHAR_LIMIT,
};

/// Shown to users for every generation failure, whatever the cause.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate listing data. Please check your API key and try again.";

/// Errors raised by a generation backend. These are logged, never shown.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("response did not contain any text candidate")]
    EmptyResponse,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// User-facing failure kinds of [`ListingGateway::generate`].
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("product description is empty")]
    EmptyInput,

    #[error("generation failed: {cause}")]
    GenerationFailed { cause: String },

    #[error("malformed response: {cause}")]
    MalformedResponse { cause: String },
}

impl GenerateError {
    /// Message safe to show in the UI. Causes stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerateError::EmptyInput => "Enter a product description to create a listing.",
            GenerateError::GenerationFailed { .. } | GenerateError::MalformedResponse { .. } => {
                GENERATION_FAILED_MESSAGE
            }
        }
    }
}

/// What the gateway hands to a backend: the instruction text and the JSON
/// schema the answer must follow.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub schema: Value,
}

/// A service able to answer a [`GenerationRequest`] with raw JSON text.
#[async_trait]
pub trait ListingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &GenerationRequest) -> Result<String, BackendError>;
}

static LISTING_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": format!(
                    "A compelling, SEO-friendly title. Max {TITLE_CHAR_LIMIT} characters. Must include at least 4 of the generated keywords."
                ),
            },
            "description": {
                "type": "STRING",
                "description": format!(
                    "A persuasive and readable product description. Max {DESCRIPTION_CHAR_LIMIT} characters. Must naturally integrate all {TARGET_KEYWORD_COUNT} generated keywords."
                ),
            },
            "keywords": {
                "type": "ARRAY",
                "description": format!(
                    "An array of {TARGET_KEYWORD_COUNT} high-value SEO keywords. Each keyword must be 2-3 words long and max {KEYWORD_CHAR_LIMIT} characters."
                ),
                "items": { "type": "STRING" },
            },
            "category": {
                "type": "STRING",
                "description": "The single most appropriate Etsy category for this product.",
            },
            "materials": {
                "type": "ARRAY",
                "description": format!(
                    "An array of {TARGET_MATERIAL_COUNT} potential materials for the product."
                ),
                "items": { "type": "STRING" },
            },
        },
        "required": ["title", "description", "keywords", "category", "materials"],
    })
});

/// The structured-output schema sent with every request.
pub fn listing_schema() -> &'static Value {
    &LISTING_SCHEMA
}

/// Embeds the product description in the fixed instruction.
pub fn build_prompt(description: &str) -> String {
    format!(
        r#"You are an expert SEO and marketing specialist for Etsy, focusing on the US market. Your task is to generate a complete, optimized product listing based on a user-provided product description.

Analyze the following product description:
"{description}"

Based on this description, generate a JSON object that strictly adheres to the provided schema. Ensure all constraints are met:
- Title: Max {TITLE_CHAR_LIMIT} characters, uses at least 4 generated keywords.
- Description: Max {DESCRIPTION_CHAR_LIMIT} characters, uses all {TARGET_KEYWORD_COUNT} generated keywords naturally.
- Keywords: Exactly {TARGET_KEYWORD_COUNT} keywords. Each is 2-3 words and max {KEYWORD_CHAR_LIMIT} chars (including spaces).
- Category: The single best-fit Etsy category.
- Materials: Exactly {TARGET_MATERIAL_COUNT} relevant materials."#
    )
}

#[derive(Clone)]
pub struct ListingGateway {
    backend: Arc<dyn ListingBackend>,
}

impl ListingGateway {
    pub fn new(backend: Arc<dyn ListingBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Generates a listing for `description` with exactly one backend call.
    pub async fn generate(&self, description: &str) -> Result<ListingData, GenerateError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(GenerateError::EmptyInput);
        }
        let request = GenerationRequest {
            prompt: build_prompt(description),
            schema: listing_schema().clone(),
        };
        let raw = self.backend.complete(&request).await.map_err(|err| {
            error!(backend = self.backend.name(), error = %err, "listing generation failed");
            GenerateError::GenerationFailed {
                cause: err.to_string(),
            }
        })?;
        let listing = parse_listing(&raw).inspect_err(|err| {
            error!(backend = self.backend.name(), error = %err, "listing response rejected");
        })?;
        info!(
            backend = self.backend.name(),
            keywords = listing.keywords.len(),
            materials = listing.materials.len(),
            "listing generated"
        );
        Ok(listing)
    }
}

#[derive(Debug, Deserialize)]
struct RawListing {
    title: Option<String>,
    description: Option<String>,
    keywords: Option<Vec<String>>,
    category: Option<String>,
    materials: Option<Vec<String>>,
}

/// Parses and shape-checks the backend's answer.
///
/// Text that is not JSON at all counts as a failed generation; JSON of the
/// wrong shape counts as a malformed response. Counts and lengths inside
/// `keywords` and `materials` are left alone.
pub fn parse_listing(raw: &str) -> Result<ListingData, GenerateError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|err| GenerateError::GenerationFailed {
            cause: format!("response is not JSON: {err}"),
        })?;
    let parsed: RawListing =
        serde_json::from_value(value).map_err(|err| GenerateError::MalformedResponse {
            cause: err.to_string(),
        })?;

    let title = required_text(parsed.title, "title")?;
    let description = required_text(parsed.description, "description")?;
    let category = required_text(parsed.category, "category")?;
    let keywords = parsed.keywords.ok_or_else(|| missing("keywords"))?;
    let materials = parsed.materials.ok_or_else(|| missing("materials"))?;

    Ok(ListingData {
        title,
        description,
        keywords,
        category,
        materials,
    })
}

/// Text fields must hold something other than whitespace, which is stricter
/// than a plain presence check: `" "` is rejected like a missing field.
fn required_text(value: Option<String>, field: &str) -> Result<String, GenerateError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(GenerateError::MalformedResponse {
            cause: format!("`{field}` is blank"),
        }),
        None => Err(missing(field)),
    }
}

fn missing(field: &str) -> GenerateError {
    GenerateError::MalformedResponse {
        cause: format!("`{field}` is missing"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const SAMPLE_RESPONSE: &str = r#"{
        "title": "Handmade Leather Tote Bag with Brass Fittings",
        "description": "A roomy leather tote bag with brass fittings and a phone pocket.",
        "keywords": ["leather tote bag", "brass fittings", "handmade bag", "tote"],
        "category": "Bags & Purses",
        "materials": ["leather", "brass", "cotton thread"]
    }"#;

    /// Backend that replays a canned answer and counts calls.
    pub(crate) struct StubBackend {
        reply: Result<String, String>,
        pub(crate) calls: AtomicUsize,
        pub(crate) last_prompt: Mutex<Option<String>>,
    }

    impl StubBackend {
        pub(crate) fn replying(body: &str) -> Self {
            Self::with(Ok(body.to_string()))
        }

        /// Fails every call as an authentication rejection.
        pub(crate) fn rejecting(message: &str) -> Self {
            Self::with(Err(message.to_string()))
        }

        fn with(reply: Result<String, String>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ListingBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn complete(&self, request: &GenerationRequest) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(request.prompt.clone());
            match &self.reply {
                Ok(body) => Ok(body.clone()),
                Err(message) => Err(BackendError::Auth(message.clone())),
            }
        }
    }

    fn gateway(backend: Arc<StubBackend>) -> ListingGateway {
        ListingGateway::new(backend)
    }

    #[tokio::test]
    async fn valid_response_becomes_listing() {
        let backend = Arc::new(StubBackend::replying(SAMPLE_RESPONSE));
        let listing = gateway(backend.clone())
            .generate("handmade leather tote")
            .await
            .unwrap();
        assert_eq!(listing.category, "Bags & Purses");
        assert_eq!(listing.keywords.len(), 4);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        let prompt = backend.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("\"handmade leather tote\""));
    }

    #[tokio::test]
    async fn blank_description_never_reaches_backend() {
        let backend = Arc::new(StubBackend::replying(SAMPLE_RESPONSE));
        let err = gateway(backend.clone()).generate("  \n\t ").await.unwrap_err();
        assert!(matches!(err, GenerateError::EmptyInput));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_category_is_malformed() {
        let body = r#"{"title":"t","description":"d","keywords":[],"materials":[]}"#;
        let backend = Arc::new(StubBackend::replying(body));
        let err = gateway(backend).generate("tote").await.unwrap_err();
        assert!(matches!(err, GenerateError::MalformedResponse { .. }));
        assert_eq!(err.user_message(), GENERATION_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn backend_failure_is_generation_failed() {
        let backend = Arc::new(StubBackend::rejecting("API key not valid"));
        let err = gateway(backend.clone()).generate("tote").await.unwrap_err();
        match &err {
            GenerateError::GenerationFailed { cause } => assert!(cause.contains("API key not valid")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.user_message(), GENERATION_FAILED_MESSAGE);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_json_text_is_generation_failure() {
        let err = parse_listing("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, GenerateError::GenerationFailed { .. }));
    }

    #[test]
    fn shape_violations_are_malformed() {
        let cases = [
            r#"{"title":"","description":"d","keywords":[],"category":"c","materials":[]}"#,
            r#"{"title":"t","description":"  ","keywords":[],"category":"c","materials":[]}"#,
            r#"{"title":"t","description":"d","keywords":"a, b","category":"c","materials":[]}"#,
            r#"{"title":"t","description":"d","keywords":[],"category":"c"}"#,
            r#"{"title":42,"description":"d","keywords":[],"category":"c","materials":[]}"#,
            r#"["not", "an", "object"]"#,
        ];
        for body in cases {
            let err = parse_listing(body).unwrap_err();
            assert!(
                matches!(err, GenerateError::MalformedResponse { .. }),
                "expected malformed for {body}"
            );
        }
    }

    #[test]
    fn whitespace_only_text_fields_are_blank() {
        for field in ["title", "description", "category"] {
            let mut value: Value = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
            value[field] = Value::String(" \n\t".to_string());
            match parse_listing(&value.to_string()) {
                Err(GenerateError::MalformedResponse { cause }) => {
                    assert_eq!(cause, format!("`{field}` is blank"));
                }
                other => panic!("expected blank {field} to be malformed, got {other:?}"),
            }
        }
        let mut value: Value = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        value["title"] = Value::String(" Tote ".to_string());
        assert_eq!(parse_listing(&value.to_string()).unwrap().title, " Tote ");
    }

    #[test]
    fn list_sizes_are_not_revalidated() {
        let body = r#"{"title":"t","description":"d","keywords":["only one"],"category":"c","materials":[]}"#;
        let listing = parse_listing(body).unwrap();
        assert_eq!(listing.keywords, vec!["only one".to_string()]);
        assert!(listing.materials.is_empty());
    }

    #[test]
    fn schema_requires_all_fields() {
        let required = listing_schema()["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(listing_schema()["properties"]["keywords"]["type"], "ARRAY");
    }
}
