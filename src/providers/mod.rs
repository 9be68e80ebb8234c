//! Provider adapters, routing and failover.
//!
//! - [`traits::ProviderAdapter`]: the per-vendor capability interface
//! - [`openai`], [`anthropic`], [`google`]: built-in HTTP adapters
//! - [`retry`]: adapter-level retry decorator
//! - [`circuit`]: per-provider circuit breaker decorator
//! - [`rate_limit`]: per-provider request quota decorator
//! - [`routing`]: kind → provider chain resolution
//! - [`failover`]: sequential chain execution

#[cfg(feature = "anthropic")]
pub mod anthropic;
pub mod circuit;
pub mod failover;
#[cfg(feature = "google")]
pub mod google;
#[cfg(any(feature = "openai", feature = "anthropic", feature = "google"))]
mod http;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pricing;
pub mod rate_limit;
pub mod retry;
pub mod routing;
pub mod traits;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
pub use circuit::{CircuitBreakerConfig, CircuitBreakerProvider, CircuitState};
pub use failover::FailoverCoordinator;
#[cfg(feature = "google")]
pub use google::GoogleProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;
pub use pricing::{Completion, Pricing, estimate_tokens};
pub use rate_limit::RateLimitedProvider;
pub use retry::{RetryConfig, RetryingProvider};
pub use routing::{RoutingConfig, TaskRouter, default_chain};
pub use traits::ProviderAdapter;
