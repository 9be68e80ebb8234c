//! Wire-level tests for the built-in vendor adapters, against wiremock.

#![cfg(all(feature = "openai", feature = "anthropic", feature = "google"))]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aigate::{
    AnthropicProvider, DEFAULT_SYSTEM_PROMPT, GoogleProvider, OpenAiProvider, Pricing,
    ProviderAdapter, ProviderFailure, Task, estimate_tokens,
};

// ============================================================================
// OpenAI
// ============================================================================

#[tokio::test]
async fn openai_success_maps_content_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 200,
            "messages": [
                {"role": "system", "content": DEFAULT_SYSTEM_PROMPT},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "Hi there!"}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test")
        .base_url(server.uri())
        .with_pricing(Pricing::new(0.5, 1.5));
    let response = provider
        .invoke(&Task::chat("Hello").max_tokens(200))
        .await
        .unwrap();

    assert_eq!(response.content, "Hi there!");
    assert_eq!(response.provider, "openai");
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.tokens.input, 100);
    assert_eq!(response.tokens.output, 50);
    assert_eq!(response.tokens.total, 150);
    assert!((response.cost - 0.000125).abs() < 1e-12);
    assert!(!response.cached);
}

#[tokio::test]
async fn openai_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "7")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert_eq!(err.provider, "openai");
    assert_eq!(
        err.cause,
        ProviderFailure::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );
    assert!(err.cause.is_transient());
}

#[tokio::test]
async fn openai_unauthorized_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-wrong").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert_eq!(err.cause, ProviderFailure::AuthenticationFailed);
    assert!(!err.cause.is_transient());
}

#[tokio::test]
async fn openai_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert_eq!(
        err.cause,
        ProviderFailure::Api {
            status: 503,
            message: "overloaded".into()
        }
    );
    assert!(err.cause.is_transient());
}

#[tokio::test]
async fn openai_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert!(matches!(err.cause, ProviderFailure::MalformedResponse(_)));
}

#[tokio::test]
async fn openai_empty_choices_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert_eq!(err.cause, ProviderFailure::EmptyResponse);
}

#[tokio::test]
async fn openai_missing_usage_is_estimated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Twelve chars"}}]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test").base_url(server.uri());
    let task = Task::chat("Hello");
    let response = provider.invoke(&task).await.unwrap();

    assert_eq!(
        response.tokens.input,
        estimate_tokens(DEFAULT_SYSTEM_PROMPT) + estimate_tokens("Hello")
    );
    assert_eq!(response.tokens.output, 3);
    assert_eq!(response.model, "gpt-4o-mini");
    assert_eq!(
        response.cost,
        provider
            .pricing()
            .cost(response.tokens.input, response.tokens.output)
    );
}

#[tokio::test]
async fn openai_connection_failure_is_http_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let provider = OpenAiProvider::new("sk-test").base_url(uri);
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert!(matches!(err.cause, ProviderFailure::Http(_)));
}

// ============================================================================
// Anthropic
// ============================================================================

#[tokio::test]
async fn anthropic_success_concatenates_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "system": "Be terse.",
            "messages": [{"role": "user", "content": "Review clause 4"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Clause 4 "},
                {"type": "tool_use", "id": "x", "name": "lookup", "input": {}},
                {"type": "text", "text": "is fine."}
            ],
            "usage": {"input_tokens": 20, "output_tokens": 6}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("sk-ant-test").base_url(server.uri());
    let task = Task::new(aigate::TaskKind::Legal, "Review clause 4").system_prompt("Be terse.");
    let response = provider.invoke(&task).await.unwrap();

    assert_eq!(response.content, "Clause 4 is fine.");
    assert_eq!(response.provider, "anthropic");
    assert_eq!(response.model, "claude-3-5-sonnet-20241022");
    assert_eq!(response.tokens.total, 26);
    assert_eq!(response.cost, Pricing::new(3.0, 15.0).cost(20, 6));
}

#[tokio::test]
async fn anthropic_forbidden_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("sk-ant-test").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert_eq!(err.provider, "anthropic");
    assert_eq!(err.cause, ProviderFailure::AuthenticationFailed);
}

#[tokio::test]
async fn anthropic_no_text_blocks_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("sk-ant-test").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert_eq!(err.cause, ProviderFailure::EmptyResponse);
}

// ============================================================================
// Google
// ============================================================================

#[tokio::test]
async fn google_success_maps_candidates_and_usage_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Plan the sprint"}]}],
            "generationConfig": {"maxOutputTokens": 1000}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Step 1. "}, {"text": "Step 2."}]}
            }],
            "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 8, "totalTokenCount": 48},
            "modelVersion": "gemini-1.5-flash-002"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("g-test").base_url(server.uri());
    let task = Task::new(aigate::TaskKind::Operational, "Plan the sprint");
    let response = provider.invoke(&task).await.unwrap();

    assert_eq!(response.content, "Step 1. Step 2.");
    assert_eq!(response.provider, "google");
    assert_eq!(response.model, "gemini-1.5-flash-002");
    assert_eq!(response.tokens.input, 40);
    assert_eq!(response.tokens.output, 8);
}

#[tokio::test]
async fn google_custom_model_changes_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("g-test")
        .base_url(server.uri())
        .model("gemini-1.5-pro");
    let response = provider.invoke(&Task::chat("Hello")).await.unwrap();

    assert_eq!(response.model, "gemini-1.5-pro");
    assert_eq!(response.tokens.output, 1);
}

#[tokio::test]
async fn google_rate_limit_without_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let provider = GoogleProvider::new("g-test").base_url(server.uri());
    let err = provider.invoke(&Task::chat("Hello")).await.unwrap_err();

    assert_eq!(err.cause, ProviderFailure::RateLimited { retry_after: None });
}
