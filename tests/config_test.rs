//! Tests for file-based configuration (`cli` feature).

#![cfg(all(unix, feature = "cli", feature = "openai"))]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aigate::config::{Config, Secrets};
use aigate::{CacheHitAccounting, CircuitState, GatewayError, ProviderFailure, Task, TaskKind};

fn write(path: &Path, contents: &str, mode: u32) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[test]
fn load_explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write(
        &path,
        r#"
            [gateway]
            timeout_secs = 15
            cache_hit_accounting = "count_requests"

            [routing]
            chat = ["anthropic", "openai"]
        "#,
        0o644,
    );

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.gateway.timeout_secs, 15);
    assert_eq!(
        config.gateway.cache_hit_accounting,
        CacheHitAccounting::CountRequests
    );
    assert_eq!(
        config.routing.chains[&TaskKind::Chat],
        vec!["anthropic", "openai"]
    );
}

#[test]
fn invalid_toml_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write(&path, "[gateway\ntimeout_secs = ", 0o644);

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("failed to parse")));
}

#[test]
fn world_readable_secrets_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.toml");
    write(&path, "[openai]\napi_key = \"sk-test\"\n", 0o644);

    let err = Secrets::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("insecure permissions"));
}

#[test]
fn private_secrets_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.toml");
    write(&path, "[openai]\napi_key = \"sk-test\"\n", 0o600);

    let secrets = Secrets::from_file(&path).unwrap();
    assert_eq!(secrets.api_key("openai"), Some("sk-test".to_string()));
}

#[tokio::test]
async fn build_gateway_applies_vendor_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-from-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "configured"}}],
            "usage": {"prompt_tokens": 1000000, "completion_tokens": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let toml = format!(
        r#"
            [providers.openai]
            base_url = "{}"
            model = "gpt-test"
            pricing = {{ input_per_million = 2.0, output_per_million = 8.0 }}

            [providers.anthropic]
            enabled = false

            [providers.google]
            enabled = false
        "#,
        server.uri()
    );
    let config: Config = toml::from_str(&toml).unwrap();
    let secrets: Secrets = toml::from_str("[openai]\napi_key = \"sk-from-file\"\n").unwrap();

    let gateway = config.build_gateway(&secrets).unwrap();
    let response = gateway.submit(Task::chat("Hello")).await.unwrap();

    assert_eq!(response.content, "configured");
    assert_eq!(response.model, "gpt-test");
    assert_eq!(response.cost, 2.0);
    gateway.shutdown().await;
}

#[tokio::test]
async fn build_gateway_without_any_key_fails() {
    let config: Config = toml::from_str(
        r#"
            [providers.openai]
            enabled = false
            [providers.anthropic]
            enabled = false
            [providers.google]
            enabled = false
        "#,
    )
    .unwrap();

    let err = config.build_gateway(&Secrets::default()).err().unwrap();
    assert!(matches!(err, GatewayError::NoProvider));
}

#[tokio::test]
async fn build_gateway_applies_quota_and_circuit_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let toml = format!(
        r#"
            [circuit_breaker]
            failure_threshold = 3

            [providers.openai]
            base_url = "{}"
            requests_per_minute = 1

            [providers.anthropic]
            enabled = false

            [providers.google]
            enabled = false
        "#,
        server.uri()
    );
    let config: Config = toml::from_str(&toml).unwrap();
    let secrets: Secrets = toml::from_str("[openai]\napi_key = \"sk-from-file\"\n").unwrap();

    let gateway = config.build_gateway(&secrets).unwrap();
    gateway.submit(Task::chat("first")).await.unwrap();
    let err = gateway.submit(Task::chat("second")).await.unwrap_err();

    let GatewayError::AllProvidersFailed(all) = err else {
        panic!("expected AllProvidersFailed, got {err:?}");
    };
    assert!(matches!(all.errors[0].cause, ProviderFailure::QuotaExceeded { .. }));
    assert_eq!(gateway.circuit_states()["openai"], CircuitState::Closed);
    gateway.shutdown().await;
}
