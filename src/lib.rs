//! aigate - AI request router with caching, failover and usage accounting
//!
//! A [`Gateway`] takes a [`Task`], answers it from a short-lived response
//! cache when it can, and otherwise routes it to an ordered chain of
//! provider adapters (OpenAI, Anthropic, Google, or anything implementing
//! [`ProviderAdapter`]), falling through to the next provider on any
//! failure. Identical tasks already in flight share one provider call.
//! Providers can be guarded by circuit breakers and per-minute request
//! quotas. Token usage and cost are aggregated per provider, task kind
//! and user.
//!
//! # Example
//!
//! ```rust,no_run
//! use aigate::{Gateway, Task, TaskKind};
//!
//! #[tokio::main]
//! async fn main() -> aigate::Result<()> {
//!     let gateway = Gateway::builder()
//!         .openai("sk-your-key")
//!         .anthropic("sk-ant-your-key")
//!         .build()?;
//!
//!     let response = gateway
//!         .submit(Task::new(TaskKind::Legal, "Summarise this NDA clause: ..."))
//!         .await?;
//!     println!("{} (via {}, ${:.6})", response.content, response.provider, response.cost);
//!
//!     let usage = gateway.usage();
//!     println!("{} requests, ${:.4}", usage.total_requests, usage.total_cost);
//!
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Custom adapters
//!
//! ```rust,ignore
//! let gateway = Gateway::builder()
//!     .provider(Arc::new(MyLocalModel::new()))
//!     .routing(RoutingConfig::new().chain(TaskKind::Chat, ["local", "openai"]))
//!     .openai(key)
//!     .build()?;
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod telemetry;
pub mod types;
pub mod usage;

pub use cache::{CacheConfig, Fingerprint, ResponseCache};
pub use error::{AllProvidersFailedError, GatewayError, ProviderError, ProviderFailure, ProviderResult, Result};
pub use gateway::{Gateway, GatewayBuilder, SubmitOptions};
pub use providers::{
    CircuitBreakerConfig, CircuitBreakerProvider, CircuitState, Completion, FailoverCoordinator,
    Pricing, ProviderAdapter, RateLimitedProvider, RetryConfig, RetryingProvider, RoutingConfig,
    TaskRouter, default_chain, estimate_tokens,
};
#[cfg(feature = "anthropic")]
pub use providers::AnthropicProvider;
#[cfg(feature = "google")]
pub use providers::GoogleProvider;
#[cfg(feature = "openai")]
pub use providers::OpenAiProvider;
pub use types::{DEFAULT_SYSTEM_PROMPT, Response, Task, TaskKind, TokenUsage};
pub use usage::{CacheHitAccounting, UsageCounters, UsageMetrics, UsageTracker};
