use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aigate::{
    Completion, Gateway, Pricing, ProviderAdapter, ProviderError, ProviderFailure, ProviderResult,
    Response, RetryConfig, RetryingProvider, Task,
};

/// Mock provider that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> ProviderFailure,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> ProviderFailure) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProviderAdapter for FailThenSucceed {
    fn name(&self) -> &str {
        "mock-retry"
    }

    fn pricing(&self) -> Pricing {
        Pricing::new(2.0, 4.0)
    }

    async fn invoke(&self, task: &Task) -> ProviderResult<Response> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err(ProviderError::new("mock-retry", (self.fail_with)()));
        }
        Ok(Completion {
            content: "ok".into(),
            model: "test".into(),
            input_tokens: Some(1),
            output_tokens: Some(1),
        }
        .into_response("mock-retry", &self.pricing(), task, Instant::now()))
    }
}

fn fast_retries(max_attempts: u32) -> RetryConfig {
    RetryConfig::new()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn retries_on_transient_error_then_succeeds() {
    let inner = Arc::new(FailThenSucceed::new(2, || ProviderFailure::RateLimited {
        retry_after: None,
    }));
    let provider = RetryingProvider::new(inner.clone(), fast_retries(3));

    let result = provider.invoke(&Task::chat("hi")).await;

    assert!(result.is_ok());
    assert_eq!(inner.call_count(), 3); // 2 failures + 1 success
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let inner = Arc::new(FailThenSucceed::new(10, || {
        ProviderFailure::Http("connection reset".into())
    }));
    let provider = RetryingProvider::new(inner.clone(), fast_retries(3));

    let err = provider.invoke(&Task::chat("hi")).await.unwrap_err();

    assert!(matches!(err.cause, ProviderFailure::Http(_)));
    assert_eq!(inner.call_count(), 3);
}

#[tokio::test]
async fn does_not_retry_permanent_errors() {
    let inner = Arc::new(FailThenSucceed::new(1, || {
        ProviderFailure::AuthenticationFailed
    }));
    let provider = RetryingProvider::new(inner.clone(), fast_retries(5));

    let result = provider.invoke(&Task::chat("hi")).await;

    assert!(result.is_err());
    assert_eq!(inner.call_count(), 1); // no retry
}

#[tokio::test(start_paused = true)]
async fn respects_retry_after_duration() {
    let inner = Arc::new(FailThenSucceed::new(1, || ProviderFailure::RateLimited {
        retry_after: Some(Duration::from_secs(5)),
    }));
    let provider = RetryingProvider::new(inner.clone(), fast_retries(3));

    let start = tokio::time::Instant::now();
    let result = provider.invoke(&Task::chat("hi")).await;

    assert!(result.is_ok());
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn decorator_is_transparent_to_routing_and_pricing() {
    let inner = Arc::new(FailThenSucceed::new(0, || ProviderFailure::EmptyResponse));
    let provider = RetryingProvider::new(inner, RetryConfig::default());

    assert_eq!(provider.name(), "mock-retry");
    assert_eq!(provider.pricing(), Pricing::new(2.0, 4.0));
}

#[tokio::test]
async fn gateway_retry_keeps_one_usage_record_per_submit() {
    let inner = Arc::new(FailThenSucceed::new(2, || ProviderFailure::Api {
        status: 500,
        message: "flaky".into(),
    }));
    let gateway = Gateway::builder()
        .provider(inner.clone())
        .retry(fast_retries(3))
        .build()
        .unwrap();

    let response = gateway.submit(Task::chat("hi")).await.unwrap();

    assert_eq!(response.provider, "mock-retry");
    assert_eq!(inner.call_count(), 3);
    assert_eq!(gateway.usage().total_requests, 1);
}

#[tokio::test]
async fn gateway_without_retry_fails_fast() {
    let inner = Arc::new(FailThenSucceed::new(1, || ProviderFailure::Http("reset".into())));
    let gateway = Gateway::builder().provider(inner.clone()).build().unwrap();

    assert!(gateway.submit(Task::chat("hi")).await.is_err());
    assert_eq!(inner.call_count(), 1);
}
