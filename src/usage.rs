//! Usage metrics aggregation.
//!
//! [`UsageTracker`] holds the process-wide request/token/cost counters,
//! partitioned by provider, task kind and (when tasks carry one) user.
//! All partitions are updated under a single lock, so at every observable
//! point:
//!
//! ```text
//! total_requests == Σ by_provider[*].requests == Σ by_task_kind[*].requests
//! ```
//!
//! and likewise for tokens and cost. `by_user` only covers tasks with a
//! `user_id`, so its sums are bounded by the totals rather than equal to them.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{Response, Task, TaskKind};

/// Whether cache hits show up in usage metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHitAccounting {
    /// Cache hits are invisible to usage metrics.
    #[default]
    Ignore,
    /// A cache hit counts as one request for the provider that produced the
    /// cached response, with zero tokens and zero cost, and bumps
    /// `cached_requests`.
    CountRequests,
}

/// Counters for one partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageCounters {
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

impl UsageCounters {
    fn add(&mut self, tokens: u64, cost: f64) {
        self.requests = self.requests.saturating_add(1);
        self.tokens = self.tokens.saturating_add(tokens);
        self.cost += cost;
    }
}

/// Point-in-time copy of all usage counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageMetrics {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Requests served from cache. Only counted under
    /// [`CacheHitAccounting::CountRequests`].
    pub cached_requests: u64,
    pub by_provider: BTreeMap<String, UsageCounters>,
    pub by_task_kind: BTreeMap<TaskKind, UsageCounters>,
    pub by_user: BTreeMap<String, UsageCounters>,
}

impl UsageMetrics {
    fn add(&mut self, task: &Task, provider: &str, tokens: u64, cost: f64) {
        self.total_requests = self.total_requests.saturating_add(1);
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        self.total_cost += cost;
        self.by_provider
            .entry(provider.to_string())
            .or_default()
            .add(tokens, cost);
        self.by_task_kind
            .entry(task.kind)
            .or_default()
            .add(tokens, cost);
        if let Some(user) = &task.user_id {
            self.by_user.entry(user.clone()).or_default().add(tokens, cost);
        }
    }
}

/// Mutex-guarded usage aggregate.
#[derive(Debug, Default)]
pub struct UsageTracker {
    inner: Mutex<UsageMetrics>,
    monthly_budget: Option<f64>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warn once when `total_cost` first crosses `budget` (USD).
    ///
    /// Purely advisory: requests are never blocked.
    pub fn with_monthly_budget(mut self, budget: f64) -> Self {
        self.monthly_budget = Some(budget);
        self
    }

    pub fn monthly_budget(&self) -> Option<f64> {
        self.monthly_budget
    }

    /// Record a provider-served response.
    pub fn record(&self, task: &Task, response: &Response) {
        let mut metrics = self.lock();
        let before = metrics.total_cost;
        metrics.add(task, &response.provider, response.tokens.total, response.cost);
        let after = metrics.total_cost;
        drop(metrics);

        if let Some(budget) = self.monthly_budget
            && before <= budget
            && after > budget
        {
            warn!(
                budget,
                total_cost = after,
                "usage cost exceeded monthly budget"
            );
        }
    }

    /// Record a cache hit under [`CacheHitAccounting::CountRequests`].
    pub fn record_cached(&self, task: &Task, response: &Response) {
        let mut metrics = self.lock();
        metrics.add(task, &response.provider, 0, 0.0);
        metrics.cached_requests = metrics.cached_requests.saturating_add(1);
    }

    /// Consistent copy of all counters.
    pub fn snapshot(&self) -> UsageMetrics {
        self.lock().clone()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        *self.lock() = UsageMetrics::default();
    }

    fn lock(&self) -> MutexGuard<'_, UsageMetrics> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
