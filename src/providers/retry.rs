//! Retry configuration, delay calculation, and the retrying adapter decorator.
//!
//! Retries are an adapter-level concern: [`RetryingProvider`] wraps one
//! adapter and retries it on transient failures, so the failover coordinator
//! still sees exactly one attempt per provider. The coordinator's per-call
//! timeout bounds the whole retry sequence.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::telemetry;

use super::pricing::Pricing;
use super::traits::ProviderAdapter;
use crate::ProviderResult;
use crate::types::{Response, Task};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff:
///
/// ```rust
/// # use aigate::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay, respecting provider `retry_after` hints.
    ///
    /// If a `retry_after` duration is provided (from a `RateLimited` failure),
    /// it takes precedence over the calculated backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute an adapter call with retry logic.
///
/// Retries on transient failures (as classified by
/// [`ProviderFailure::is_transient()`](crate::ProviderFailure::is_transient))
/// up to `config.max_attempts`. Permanent failures are returned immediately.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    f: F,
) -> ProviderResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.cause.is_transient() && attempt + 1 < attempts => {
                let delay = config.effective_delay(attempt, e.cause.retry_after());
                metrics::counter!(telemetry::RETRIES_TOTAL, "provider" => provider_name.to_owned())
                    .increment(1);
                warn!(
                    provider = provider_name,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e.cause,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Decorator that wraps a [`ProviderAdapter`] with retry logic.
///
/// Name and pricing are delegated to the inner adapter, so routing and
/// accounting cannot tell the decorator apart from the adapter it wraps.
pub struct RetryingProvider {
    inner: Arc<dyn ProviderAdapter>,
    config: RetryConfig,
}

impl RetryingProvider {
    /// Wrap an adapter with retry logic.
    pub fn new(inner: Arc<dyn ProviderAdapter>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ProviderAdapter for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn pricing(&self) -> Pricing {
        self.inner.pricing()
    }

    async fn invoke(&self, task: &Task) -> ProviderResult<Response> {
        with_retry(&self.config, self.inner.name(), || self.inner.invoke(task)).await
    }
}
