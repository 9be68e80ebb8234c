//! Per-provider circuit breaker.
//!
//! [`CircuitBreakerProvider`] wraps one adapter. After `failure_threshold`
//! consecutive failures the circuit opens and calls are refused with
//! [`ProviderFailure::CircuitOpen`] without reaching the vendor, so the
//! failover coordinator moves straight on to the next provider. Once
//! `reset_timeout` has passed, a single trial call is let through
//! (half-open): success closes the circuit, failure opens it again.
//!
//! A call that is abandoned before it returns (per-call timeout,
//! cancellation) counts as a failure.
//!
//! ```text
//!   Closed ──(threshold consecutive failures)──► Open
//!     ▲                                           │ reset_timeout
//!     │ trial ok                                  ▼
//!     └──────────────────────────────────────  HalfOpen ──(trial fails)──► Open
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use super::pricing::Pricing;
use super::traits::ProviderAdapter;
use crate::telemetry;
use crate::types::{Response, Task};
use crate::{ProviderError, ProviderFailure, ProviderResult};

/// Circuit breaker settings, shared by every provider it is applied to.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit. Default: 5.
    pub failure_threshold: u32,
    /// How long an open circuit refuses calls before a trial. Default: 30s.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Decorator that guards a [`ProviderAdapter`] with a circuit breaker.
///
/// Name and pricing are delegated to the inner adapter.
pub struct CircuitBreakerProvider {
    inner: Arc<dyn ProviderAdapter>,
    config: CircuitBreakerConfig,
    breaker: Mutex<Breaker>,
}

impl CircuitBreakerProvider {
    pub fn new(inner: Arc<dyn ProviderAdapter>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            config,
            breaker: Mutex::new(Breaker {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Current state. An open circuit whose reset timeout has passed is
    /// reported as half-open: the next call will be let through as a trial.
    pub fn state(&self) -> CircuitState {
        let breaker = self.lock();
        match breaker.state {
            CircuitState::Open if self.reset_elapsed(&breaker) => CircuitState::HalfOpen,
            state => state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Breaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_elapsed(&self, breaker: &Breaker) -> bool {
        breaker
            .opened_at
            .is_none_or(|opened| opened.elapsed() >= self.config.reset_timeout)
    }

    fn admit(&self) -> bool {
        let mut breaker = self.lock();
        match breaker.state {
            CircuitState::Closed => true,
            CircuitState::Open if self.reset_elapsed(&breaker) => {
                breaker.state = CircuitState::HalfOpen;
                breaker.trial_in_flight = true;
                info!(provider = self.inner.name(), "circuit half-open, sending trial call");
                true
            }
            CircuitState::Open => false,
            CircuitState::HalfOpen if breaker.trial_in_flight => false,
            CircuitState::HalfOpen => {
                breaker.trial_in_flight = true;
                true
            }
        }
    }

    fn record(&self, success: bool) {
        let mut breaker = self.lock();
        if success {
            breaker.consecutive_failures = 0;
            breaker.trial_in_flight = false;
            if breaker.state != CircuitState::Closed {
                breaker.state = CircuitState::Closed;
                breaker.opened_at = None;
                info!(provider = self.inner.name(), "circuit closed");
            }
            return;
        }

        breaker.consecutive_failures = breaker.consecutive_failures.saturating_add(1);
        let reopen = match breaker.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => breaker.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if reopen {
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
            breaker.trial_in_flight = false;
            warn!(
                provider = self.inner.name(),
                failures = breaker.consecutive_failures,
                reset_after_ms = self.config.reset_timeout.as_millis() as u64,
                "circuit opened"
            );
        }
    }
}

/// Records the outcome of one admitted call, including calls dropped
/// before they finish.
struct Attempt<'a> {
    provider: &'a CircuitBreakerProvider,
    finished: bool,
}

impl Attempt<'_> {
    fn finish(mut self, success: bool) {
        self.finished = true;
        self.provider.record(success);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.provider.record(false);
        }
    }
}

#[async_trait]
impl ProviderAdapter for CircuitBreakerProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn pricing(&self) -> Pricing {
        self.inner.pricing()
    }

    async fn invoke(&self, task: &Task) -> ProviderResult<Response> {
        if !self.admit() {
            metrics::counter!(telemetry::CIRCUIT_REJECTIONS_TOTAL,
                "provider" => self.inner.name().to_owned(),
            )
            .increment(1);
            return Err(ProviderError::new(self.inner.name(), ProviderFailure::CircuitOpen));
        }

        let attempt = Attempt {
            provider: self,
            finished: false,
        };
        let result = self.inner.invoke(task).await;
        attempt.finish(result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ProviderAdapter for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn pricing(&self) -> Pricing {
            Pricing::new(0.0, 0.0)
        }

        async fn invoke(&self, task: &Task) -> ProviderResult<Response> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ProviderError::new("flaky", ProviderFailure::EmptyResponse));
            }
            Ok(crate::Completion {
                content: "ok".into(),
                model: "m".into(),
                input_tokens: Some(1),
                output_tokens: Some(1),
            }
            .into_response("flaky", &self.pricing(), task, std::time::Instant::now()))
        }
    }

    fn breaker(threshold: u32) -> (Arc<Flaky>, CircuitBreakerProvider) {
        let flaky = Arc::new(Flaky {
            fail: std::sync::atomic::AtomicBool::new(true),
        });
        let provider = CircuitBreakerProvider::new(
            flaky.clone(),
            CircuitBreakerConfig::new()
                .failure_threshold(threshold)
                .reset_timeout(Duration::from_secs(30)),
        );
        (flaky, provider)
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_consecutive_failures() {
        let (_, provider) = breaker(2);
        let task = Task::chat("hi");

        provider.invoke(&task).await.unwrap_err();
        assert_eq!(provider.state(), CircuitState::Closed);
        provider.invoke(&task).await.unwrap_err();
        assert_eq!(provider.state(), CircuitState::Open);

        let err = provider.invoke(&task).await.unwrap_err();
        assert_eq!(err.cause, ProviderFailure::CircuitOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_trial_closes_the_circuit() {
        let (flaky, provider) = breaker(1);
        let task = Task::chat("hi");

        provider.invoke(&task).await.unwrap_err();
        assert_eq!(provider.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(provider.state(), CircuitState::HalfOpen);

        flaky.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        provider.invoke(&task).await.unwrap();
        assert_eq!(provider.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens_for_a_full_timeout() {
        let (_, provider) = breaker(1);
        let task = Task::chat("hi");

        provider.invoke(&task).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(30)).await;

        let err = provider.invoke(&task).await.unwrap_err();
        assert_eq!(err.cause, ProviderFailure::EmptyResponse);
        assert_eq!(provider.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(29)).await;
        let err = provider.invoke(&task).await.unwrap_err();
        assert_eq!(err.cause, ProviderFailure::CircuitOpen);
    }

    #[tokio::test]
    async fn success_resets_the_failure_count() {
        let (flaky, provider) = breaker(2);
        let task = Task::chat("hi");

        provider.invoke(&task).await.unwrap_err();
        flaky.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        provider.invoke(&task).await.unwrap();
        flaky.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        provider.invoke(&task).await.unwrap_err();

        assert_eq!(provider.state(), CircuitState::Closed);
    }
}
