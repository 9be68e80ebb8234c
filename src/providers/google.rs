//! Google Gemini `generateContent` adapter.
//!
//! See: <https://ai.google.dev/api/generate-content>

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::http::send_json;
use super::pricing::{Completion, Pricing};
use super::traits::ProviderAdapter;
use crate::types::{Response, Task};
use crate::{ProviderError, ProviderFailure, ProviderResult};

/// Default base URL for the Gemini API
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used unless overridden.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini 1.5 Flash list price, USD per million tokens.
pub const DEFAULT_PRICING: Pricing = Pricing::new(0.075, 0.30);

/// Adapter for Gemini's `models/{model}:generateContent`.
#[derive(Clone)]
pub struct GoogleProvider {
    api_key: String,
    http: Client,
    base_url: String,
    model: String,
    pricing: Pricing,
}

impl GoogleProvider {
    /// Create an adapter with its own HTTP client.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http_client(api_key, Client::new())
    }

    /// Create an adapter sharing a connection pool with other adapters.
    pub fn with_http_client(api_key: impl Into<String>, http: Client) -> Self {
        Self {
            api_key: api_key.into(),
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            pricing: DEFAULT_PRICING,
        }
    }

    /// Override the base URL (for testing with wiremock).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    async fn complete(&self, task: &Task) -> Result<Completion, ProviderFailure> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: task.effective_system_prompt(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &task.prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: task.max_tokens,
                temperature: task.temperature,
            },
        };

        let reply: GenerateReply = send_json(
            self.http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        let content: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ProviderFailure::EmptyResponse);
        }

        Ok(Completion {
            content,
            model: reply.model_version.unwrap_or_else(|| self.model.clone()),
            input_tokens: reply.usage_metadata.as_ref().and_then(|u| u.prompt_token_count),
            output_tokens: reply
                .usage_metadata
                .as_ref()
                .and_then(|u| u.candidates_token_count),
        })
    }
}

#[async_trait]
impl ProviderAdapter for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn pricing(&self) -> Pricing {
        self.pricing
    }

    #[instrument(skip_all, fields(provider = "google", model = %self.model))]
    async fn invoke(&self, task: &Task) -> ProviderResult<Response> {
        let started = Instant::now();
        let completion = self
            .complete(task)
            .await
            .map_err(|cause| ProviderError::new(self.name(), cause))?;
        Ok(completion.into_response(self.name(), &self.pricing, task, started))
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ReplyContent>,
}

#[derive(Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u64>,
    #[serde(default)]
    candidates_token_count: Option<u64>,
}
