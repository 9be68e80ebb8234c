//! Provider adapter trait.
//!
//! One implementation per vendor. An adapter turns a [`Task`] into the
//! vendor's call and the vendor's reply into a canonical [`Response`].
//!
//! # Contract
//!
//! - Failures (auth, network, rate limit, malformed reply) come back as a
//!   [`ProviderError`](crate::ProviderError) value. Adapters never panic; the failover coordinator
//!   relies on errors being values to move to the next provider.
//! - `cost` is computed with [`Pricing::cost()`] from the adapter's own
//!   pricing table.
//! - Adapters never write to the response cache or the usage counters.
//!
//! # Example
//!
//! ```ignore
//! struct EchoProvider;
//!
//! #[async_trait]
//! impl ProviderAdapter for EchoProvider {
//!     fn name(&self) -> &str { "echo" }
//!     fn pricing(&self) -> Pricing { Pricing::new(0.0, 0.0) }
//!     async fn invoke(&self, task: &Task) -> ProviderResult<Response> {
//!         let completion = Completion { content: task.prompt.clone(), ..Default::default() };
//!         Ok(completion.into_response(self.name(), &self.pricing(), task, Instant::now()))
//!     }
//! }
//! ```

use async_trait::async_trait;

use super::pricing::Pricing;
use crate::ProviderResult;
use crate::types::{Response, Task};

/// Capability interface implemented once per model vendor.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name used in routing chains, metrics and errors.
    fn name(&self) -> &str;

    /// Static pricing table used to derive `Response::cost`.
    fn pricing(&self) -> Pricing;

    /// Perform one vendor call.
    async fn invoke(&self, task: &Task) -> ProviderResult<Response>;
}
