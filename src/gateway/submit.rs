//! `Gateway::submit` and the administrative surface.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::GatewayBuilder;
use crate::cache::inflight::Join;
use crate::cache::{InFlight, ResponseCache};
use crate::providers::{CircuitBreakerProvider, CircuitState, FailoverCoordinator, TaskRouter};
use crate::types::{Response, Task};
use crate::usage::{CacheHitAccounting, UsageMetrics, UsageTracker};
use crate::{GatewayError, Result};

/// Per-call overrides for [`Gateway::submit_with`].
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Per-provider-call timeout. Defaults to the gateway's.
    pub timeout: Option<Duration>,
    /// Cancels the submit, including the in-flight provider call.
    pub cancel: Option<CancellationToken>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Routes tasks to AI providers with caching, failover and usage accounting.
///
/// Construct with [`Gateway::builder()`]. Share between tasks behind an
/// `Arc`; every method takes `&self`.
pub struct Gateway {
    pub(super) router: TaskRouter,
    pub(super) coordinator: FailoverCoordinator,
    pub(super) cache: Arc<ResponseCache>,
    pub(super) usage: Arc<UsageTracker>,
    pub(super) accounting: CacheHitAccounting,
    pub(super) timeout: Duration,
    pub(super) shutdown: CancellationToken,
    pub(super) sweeper: Mutex<Option<JoinHandle<()>>>,
    pub(super) inflight: InFlight,
    pub(super) circuits: BTreeMap<String, Arc<CircuitBreakerProvider>>,
}

impl Gateway {
    /// Create a new builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Submit a task with the gateway's default timeout.
    pub async fn submit(&self, task: Task) -> Result<Response> {
        self.submit_with(task, SubmitOptions::default()).await
    }

    /// Submit a task.
    ///
    /// 1. Invalid tasks are rejected before touching the cache.
    /// 2. If an identical task is already in flight, its outcome is shared:
    ///    a response comes back with `cached = true`, a failure is returned
    ///    as-is. No provider is called.
    /// 3. A fresh cache entry is returned as-is (`cached = true`); no
    ///    provider is called.
    /// 4. Otherwise the kind's provider chain is run. On success usage is
    ///    recorded, then the response is cached.
    /// 5. If every provider fails, `AllProvidersFailed` is returned and
    ///    neither usage nor cache change.
    ///
    /// A submit that waits on an identical one runs under that submit's
    /// timeout. If the submit it waits on is cancelled, the waiting submit
    /// starts over on its own.
    ///
    /// After [`shutdown()`](Self::shutdown), cache misses fail with
    /// [`GatewayError::Cancelled`].
    #[instrument(skip_all, fields(kind = %task.kind))]
    pub async fn submit_with(&self, task: Task, options: SubmitOptions) -> Result<Response> {
        task.validate()?;

        loop {
            let follower = match self.inflight.join(&task) {
                Join::Leader(flight) => {
                    let outcome = self.lead(&task, &options).await;
                    if !matches!(outcome, Err(GatewayError::Cancelled)) {
                        flight.publish(&outcome);
                    }
                    return outcome;
                }
                Join::Follower(follower) => follower,
            };

            debug!("identical task in flight, waiting for its outcome");
            let outcome = match &options.cancel {
                Some(caller) => tokio::select! {
                    biased;
                    _ = caller.cancelled() => return Err(GatewayError::Cancelled),
                    outcome = follower.outcome() => outcome,
                },
                None => follower.outcome().await,
            };
            match outcome {
                Some(Ok(mut response)) => {
                    response.cached = true;
                    self.account_hit(&task, &response);
                    return Ok(response);
                }
                Some(Err(err)) => return Err(err),
                None => debug!("in-flight task was abandoned, starting over"),
            }
        }
    }

    /// Cache lookup, then the provider chain. Runs once per in-flight key.
    async fn lead(&self, task: &Task, options: &SubmitOptions) -> Result<Response> {
        if let Some(response) = self.cache.get(task) {
            self.account_hit(task, &response);
            return Ok(response);
        }

        let chain = self.router.select_chain(task.kind);
        debug!(chain = ?chain, "routing task");

        let timeout = options.timeout.unwrap_or(self.timeout);
        let token = self.shutdown.child_token();
        let run = self.coordinator.run(chain, task, timeout, &token);

        let response = match &options.cancel {
            Some(caller) => tokio::select! {
                biased;
                _ = caller.cancelled() => return Err(GatewayError::Cancelled),
                result = run => result?,
            },
            None => run.await?,
        };

        self.usage.record(task, &response);
        self.cache.put(task, &response);
        Ok(response)
    }

    fn account_hit(&self, task: &Task, response: &Response) {
        if self.accounting == CacheHitAccounting::CountRequests {
            self.usage.record_cached(task, response);
        }
    }

    /// Point-in-time usage snapshot.
    pub fn usage(&self) -> UsageMetrics {
        self.usage.snapshot()
    }

    /// Zero all usage counters.
    pub fn reset_usage(&self) {
        self.usage.reset();
    }

    /// Number of cached responses (including expired, unswept ones).
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn router(&self) -> &TaskRouter {
        &self.router
    }

    /// Circuit state per provider. Empty unless the gateway was built with
    /// [`circuit_breaker()`](GatewayBuilder::circuit_breaker).
    pub fn circuit_states(&self) -> BTreeMap<String, CircuitState> {
        self.circuits
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }

    /// Stop the background sweeper and cancel in-flight submits.
    ///
    /// Idempotent. Waits for the sweeper task to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                debug!(error = %err, "cache sweeper task ended abnormally");
            }
            info!("gateway shut down");
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
