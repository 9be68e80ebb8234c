//! Telemetry metric name constants.
//!
//! Centralised metric names for gateway operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! These are operational signals and are independent of
//! [`UsageMetrics`](crate::UsageMetrics), which is the accounting view
//! returned by [`Gateway::usage()`](crate::Gateway::usage).
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `aigate_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`, `_usd`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "openai", "anthropic")
//! - `kind`: task kind (e.g. "chat", "legal")
//! - `status`: outcome: "ok" or "error"
//! - `direction`: token direction: "input" or "output"

/// Total provider attempts made by the failover coordinator.
///
/// Labels: `provider`, `kind`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "aigate_requests_total";

/// Provider attempt duration in seconds.
///
/// Labels: `provider`, `kind`.
pub const REQUEST_DURATION_SECONDS: &str = "aigate_request_duration_seconds";

/// Cost of each successful provider call in USD.
///
/// Labels: `provider`.
pub const REQUEST_COST_USD: &str = "aigate_request_cost_usd";

/// Total tokens consumed.
///
/// Labels: `provider`, `direction` ("input" | "output").
pub const TOKENS_TOTAL: &str = "aigate_tokens_total";

/// Times the coordinator moved past a failed provider.
///
/// Labels: `provider` (the one that failed), `kind`.
pub const FAILOVERS_TOTAL: &str = "aigate_failovers_total";

/// Total retry attempts inside an adapter (not counting the initial call).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "aigate_retries_total";

/// Total response cache hits.
///
/// Labels: `kind`.
pub const CACHE_HITS_TOTAL: &str = "aigate_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `kind`.
pub const CACHE_MISSES_TOTAL: &str = "aigate_cache_misses_total";

/// Entries removed from the response cache by the sweeper or by
/// capacity eviction.
pub const CACHE_EVICTIONS_TOTAL: &str = "aigate_cache_evictions_total";

/// Calls refused because the provider's circuit breaker was open.
///
/// Labels: `provider`.
pub const CIRCUIT_REJECTIONS_TOTAL: &str = "aigate_circuit_rejections_total";

/// Calls refused by the local per-minute request quota.
///
/// Labels: `provider`, `scope` ("global" | "user").
pub const QUOTA_REJECTIONS_TOTAL: &str = "aigate_quota_rejections_total";
