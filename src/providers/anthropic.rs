//! Anthropic Messages API adapter.
//!
//! See: <https://docs.anthropic.com/en/api/messages>

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

/// Default base URL for the Anthropic API
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";

/// Model used unless overridden.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// Claude 3.5 Sonnet list price, USD per million tokens.
pub const DEFAULT_PRICING: Pricing = Pricing::new(3.0, 15.0);

/// Adapter for Anthropic's `/v1/messages`.
#[derive(Clone)]
pub struct AnthropicProvider {
    api_key: String,
    http: Client,
    base_url: String,
    model: String,
    pricing: Pricing,
}

impl AnthropicProvider {
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
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            system: task.effective_system_prompt(),
            messages: [UserMessage {
                role: "user",
                content: &task.prompt,
            }],
            max_tokens: task.max_tokens,
            temperature: task.temperature,
        };

        let reply: MessagesReply = send_json(
            self.http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body),
        )
        .await?;

        // Concatenate all text blocks; tool_use and other block types are ignored.
        let content: String = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if content.is_empty() {
            return Err(ProviderFailure::EmptyResponse);
        }

        Ok(Completion {
            content,
            model: reply.model.unwrap_or_else(|| self.model.clone()),
            input_tokens: reply.usage.as_ref().map(|u| u.input_tokens),
            output_tokens: reply.usage.as_ref().map(|u| u.output_tokens),
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn pricing(&self) -> Pricing {
        self.pricing
    }

    #[instrument(skip_all, fields(provider = "anthropic", model = %self.model))]
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
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ReplyUsage {
    input_tokens: u64,
    output_tokens: u64,
}
