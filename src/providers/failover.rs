//! Failover coordinator: drives a provider chain for one task.
//!
//! # Semantics
//!
//! - Providers are tried **sequentially**, in chain order, never in
//!   parallel: one logical request must not incur cost on several vendors.
//! - Each attempt is bounded by a per-call timeout. A timeout is just
//!   another [`ProviderError`] and triggers failover.
//! - Every failure triggers failover; the first success ends the run.
//! - No provider is attempted twice in one run. Retrying a provider is the
//!   job of the [`RetryingProvider`](super::RetryingProvider) decorator.
//! - Cancellation is checked before each attempt and raced against the
//!   in-flight call; a cancelled run stops immediately with
//!   [`GatewayError::Cancelled`].
//!
//! # Flow
//!
//! ```text
//! chain = [A, B, C]
//!         │
//!         ▼
//!   ┌───────────┐  ProviderError / timeout
//!   │ invoke A  │ ─────────────────────────┐
//!   └───────────┘                          ▼
//!                                   ┌───────────┐   Ok(response)
//!                                   │ invoke B  │ ──────────────► return (provider = B)
//!                                   └───────────┘
//!
//! all fail ──► AllProvidersFailed { errors: [A, B, C] }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::telemetry;

use super::traits::ProviderAdapter;
use crate::types::{Response, Task};
use crate::{AllProvidersFailedError, GatewayError, ProviderError, ProviderFailure, Result};

/// Registered adapters, looked up by name when a chain is run.
pub struct FailoverCoordinator {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl FailoverCoordinator {
    /// Create a coordinator over the given adapters.
    ///
    /// Names must be unique; a later adapter with the same name replaces
    /// an earlier one.
    pub fn new(providers: impl IntoIterator<Item = Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
        }
    }

    /// Whether an adapter with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Run the chain for one task.
    ///
    /// Returns the first successful response, tagged with the provider that
    /// produced it, or `AllProvidersFailed` with one error per attempted
    /// provider, in chain order.
    #[instrument(skip_all, fields(kind = %task.kind, chain_len = chain.len()))]
    pub async fn run(
        &self,
        chain: &[String],
        task: &Task,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let mut errors = Vec::with_capacity(chain.len());

        for (position, name) in chain.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            let Some(provider) = self.providers.get(name) else {
                warn!(provider = %name, "chain names an unregistered provider");
                errors.push(ProviderError::new(name.as_str(), ProviderFailure::NotRegistered));
                continue;
            };

            let start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(provider = %name, "cancelled during provider call");
                    return Err(GatewayError::Cancelled);
                }
                outcome = tokio::time::timeout(timeout, provider.invoke(task)) => outcome,
            };

            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(ProviderError::new(
                    name.as_str(),
                    ProviderFailure::Timeout(timeout),
                )),
            };

            match result {
                Ok(mut response) => {
                    Self::record_attempt(name, task, start, true);
                    Self::record_usage(name, &response);
                    if position > 0 {
                        debug!(provider = %name, position, "served by fallback provider");
                    }
                    response.provider = name.clone();
                    response.cached = false;
                    return Ok(response);
                }
                Err(err) => {
                    Self::record_attempt(name, task, start, false);
                    metrics::counter!(telemetry::FAILOVERS_TOTAL,
                        "provider" => name.clone(),
                        "kind" => task.kind.as_str(),
                    )
                    .increment(1);
                    warn!(provider = %name, error = %err.cause, "provider failed, trying next");
                    // Adapters tag their own errors; the chain name is authoritative.
                    errors.push(ProviderError::new(name.as_str(), err.cause));
                }
            }
        }

        Err(AllProvidersFailedError { errors }.into())
    }

    fn record_attempt(provider: &str, task: &Task, start: Instant, success: bool) {
        let status = if success { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider.to_owned(),
            "kind" => task.kind.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider.to_owned(),
            "kind" => task.kind.as_str(),
        )
        .record(start.elapsed().as_secs_f64());
    }

    fn record_usage(provider: &str, response: &Response) {
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "input",
        )
        .increment(response.tokens.input);
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "output",
        )
        .increment(response.tokens.output);
        metrics::histogram!(telemetry::REQUEST_COST_USD, "provider" => provider.to_owned())
            .record(response.cost);
    }
}
