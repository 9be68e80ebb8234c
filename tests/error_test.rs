use std::time::Duration;

use aigate::{
    AllProvidersFailedError, GatewayError, ProviderError, ProviderFailure, Result, TaskKind,
};

#[test]
fn test_provider_error_display_names_provider() {
    let err = ProviderError::new("anthropic", ProviderFailure::AuthenticationFailed);
    assert_eq!(err.to_string(), "anthropic: authentication failed");
}

#[test]
fn test_all_failed_display_lists_errors_in_order() {
    let err: GatewayError = AllProvidersFailedError {
        errors: vec![
            ProviderError::new("openai", ProviderFailure::RateLimited { retry_after: None }),
            ProviderError::new("google", ProviderFailure::EmptyResponse),
        ],
    }
    .into();
    let text = err.to_string();
    assert!(text.starts_with("all providers failed: openai: rate limited"));
    assert!(text.ends_with("google: empty response from model"));
    assert!(text.find("openai").unwrap() < text.find("google").unwrap());
}

#[test]
fn test_unknown_kind() {
    let err = "poetry".parse::<TaskKind>().unwrap_err();
    assert_eq!(err.to_string(), "unknown task kind: poetry");
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(GatewayError::NoProvider)
    }
    assert!(returns_error().is_err());
}

// ============================================================================
// Transient error classification
// ============================================================================

#[test]
fn transient_failures() {
    assert!(ProviderFailure::RateLimited { retry_after: None }.is_transient());
    assert!(
        ProviderFailure::RateLimited {
            retry_after: Some(Duration::from_secs(1))
        }
        .is_transient()
    );
    assert!(ProviderFailure::Http("connection reset".into()).is_transient());
    assert!(ProviderFailure::Timeout(Duration::from_secs(60)).is_transient());
    assert!(
        ProviderFailure::Api {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient()
    );
}

#[test]
fn permanent_failures() {
    assert!(!ProviderFailure::AuthenticationFailed.is_transient());
    assert!(
        !ProviderFailure::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_transient()
    );
    assert!(!ProviderFailure::MalformedResponse("eof".into()).is_transient());
    assert!(!ProviderFailure::EmptyResponse.is_transient());
    assert!(!ProviderFailure::NotRegistered.is_transient());
    assert!(!ProviderFailure::CircuitOpen.is_transient());
    assert!(
        !ProviderFailure::QuotaExceeded {
            scope: "global".into()
        }
        .is_transient()
    );
}

#[test]
fn retry_after_only_from_rate_limits() {
    assert_eq!(
        ProviderFailure::RateLimited {
            retry_after: Some(Duration::from_secs(3))
        }
        .retry_after(),
        Some(Duration::from_secs(3))
    );
    assert_eq!(ProviderFailure::Http("x".into()).retry_after(), None);
}
