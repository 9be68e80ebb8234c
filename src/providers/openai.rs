//! OpenAI chat completions adapter.
//!
//! See: <https://platform.openai.com/docs/api-reference/chat>

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

/// Default base URL for the OpenAI API
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Model used unless overridden.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// gpt-4o-mini list price, USD per million tokens.
pub const DEFAULT_PRICING: Pricing = Pricing::new(0.15, 0.60);

/// Adapter for OpenAI's `/v1/chat/completions`.
#[derive(Clone)]
pub struct OpenAiProvider {
    api_key: String,
    http: Client,
    base_url: String,
    model: String,
    pricing: Pricing,
}

impl OpenAiProvider {
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
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: task.effective_system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: &task.prompt,
                },
            ],
            max_tokens: task.max_tokens,
            temperature: task.temperature,
        };

        let reply: ChatReply = send_json(
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(ProviderFailure::EmptyResponse)?;

        Ok(Completion {
            content,
            model: reply.model.unwrap_or_else(|| self.model.clone()),
            input_tokens: reply.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: reply.usage.as_ref().map(|u| u.completion_tokens),
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn pricing(&self) -> Pricing {
        self.pricing
    }

    #[instrument(skip_all, fields(provider = "openai", model = %self.model))]
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ReplyUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
