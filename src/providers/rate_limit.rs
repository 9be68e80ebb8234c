//! Local per-provider request quotas.
//!
//! [`RateLimitedProvider`] caps how many requests per minute the gateway
//! sends to one provider, overall and per user. A user gets a third of the
//! provider's quota (at least one request per minute). Tasks without a
//! `user_id` only count against the overall quota.
//!
//! A refused call fails with [`ProviderFailure::QuotaExceeded`] without
//! reaching the vendor, and the failover coordinator moves on to the next
//! provider in the chain.
//!
//! Quotas use `governor`'s GCRA limiter: the full per-minute allowance is
//! available as a burst and refills evenly over the minute.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use super::pricing::Pricing;
use super::traits::ProviderAdapter;
use crate::telemetry;
use crate::types::{Response, Task};
use crate::{ProviderError, ProviderFailure, ProviderResult};

/// Tracked users above which idle per-user state is pruned.
const USER_STATE_SOFT_LIMIT: usize = 10_000;

/// Decorator that applies a per-minute request quota to a [`ProviderAdapter`].
pub struct RateLimitedProvider {
    inner: Arc<dyn ProviderAdapter>,
    requests_per_minute: NonZeroU32,
    user_requests_per_minute: NonZeroU32,
    global: DefaultDirectRateLimiter,
    per_user: DefaultKeyedRateLimiter<String>,
}

impl RateLimitedProvider {
    pub fn new(inner: Arc<dyn ProviderAdapter>, requests_per_minute: NonZeroU32) -> Self {
        let user_requests_per_minute =
            NonZeroU32::new(requests_per_minute.get() / 3).unwrap_or(NonZeroU32::MIN);
        Self {
            inner,
            requests_per_minute,
            user_requests_per_minute,
            global: RateLimiter::direct(Quota::per_minute(requests_per_minute)),
            per_user: RateLimiter::keyed(Quota::per_minute(user_requests_per_minute)),
        }
    }

    pub fn requests_per_minute(&self) -> NonZeroU32 {
        self.requests_per_minute
    }

    pub fn user_requests_per_minute(&self) -> NonZeroU32 {
        self.user_requests_per_minute
    }

    fn admit(&self, task: &Task) -> Result<(), ProviderFailure> {
        if self.global.check().is_err() {
            return Err(self.refuse("global", None));
        }
        if let Some(user) = &task.user_id {
            if self.per_user.len() > USER_STATE_SOFT_LIMIT {
                self.per_user.retain_recent();
            }
            if self.per_user.check_key(user).is_err() {
                return Err(self.refuse("user", Some(user)));
            }
        }
        Ok(())
    }

    fn refuse(&self, scope: &'static str, user: Option<&str>) -> ProviderFailure {
        metrics::counter!(telemetry::QUOTA_REJECTIONS_TOTAL,
            "provider" => self.inner.name().to_owned(),
            "scope" => scope,
        )
        .increment(1);
        warn!(provider = self.inner.name(), scope, user, "request quota exhausted");
        ProviderFailure::QuotaExceeded {
            scope: match user {
                Some(user) => format!("user {user}"),
                None => scope.to_string(),
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for RateLimitedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn pricing(&self) -> Pricing {
        self.inner.pricing()
    }

    async fn invoke(&self, task: &Task) -> ProviderResult<Response> {
        self.admit(task)
            .map_err(|cause| ProviderError::new(self.inner.name(), cause))?;
        self.inner.invoke(task).await
    }
}
