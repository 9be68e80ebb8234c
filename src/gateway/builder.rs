//! Builder for configuring gateway instances

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Gateway;
use crate::cache::{CacheConfig, InFlight, ResponseCache, spawn_sweeper};
use crate::providers::{
    CircuitBreakerConfig, CircuitBreakerProvider, FailoverCoordinator, ProviderAdapter,
    RateLimitedProvider, RetryConfig, RetryingProvider, RoutingConfig, TaskRouter,
};
use crate::usage::{CacheHitAccounting, UsageTracker};
use crate::{GatewayError, Result};

/// Default per-provider-call timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for [`Gateway`].
///
/// Built-in vendors are registered from API keys; anything else implementing
/// [`ProviderAdapter`] can be added with [`provider()`](Self::provider).
/// Registration order is openai, anthropic, google, then custom adapters in
/// the order they were added.
pub struct GatewayBuilder {
    #[cfg(feature = "openai")]
    openai_key: Option<String>,
    #[cfg(feature = "anthropic")]
    anthropic_key: Option<String>,
    #[cfg(feature = "google")]
    google_key: Option<String>,
    providers: Vec<Arc<dyn ProviderAdapter>>,
    routing: RoutingConfig,
    cache: CacheConfig,
    retry: Option<RetryConfig>,
    circuit_breaker: Option<CircuitBreakerConfig>,
    rate_limits: BTreeMap<String, u32>,
    timeout: Duration,
    accounting: CacheHitAccounting,
    monthly_budget: Option<f64>,
    sweeper: bool,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "openai")]
            openai_key: None,
            #[cfg(feature = "anthropic")]
            anthropic_key: None,
            #[cfg(feature = "google")]
            google_key: None,
            providers: Vec::new(),
            routing: RoutingConfig::default(),
            cache: CacheConfig::default(),
            retry: None,
            circuit_breaker: None,
            rate_limits: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            accounting: CacheHitAccounting::default(),
            monthly_budget: None,
            sweeper: true,
        }
    }

    /// Configure the OpenAI adapter.
    #[cfg(feature = "openai")]
    pub fn openai(mut self, api_key: impl Into<String>) -> Self {
        self.openai_key = Some(api_key.into());
        self
    }

    /// Configure the Anthropic adapter.
    #[cfg(feature = "anthropic")]
    pub fn anthropic(mut self, api_key: impl Into<String>) -> Self {
        self.anthropic_key = Some(api_key.into());
        self
    }

    /// Configure the Google (Gemini) adapter.
    #[cfg(feature = "google")]
    pub fn google(mut self, api_key: impl Into<String>) -> Self {
        self.google_key = Some(api_key.into());
        self
    }

    /// Register a custom adapter. Its `name()` must be unique.
    pub fn provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Override provider chains per task kind.
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    /// Configure the response cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Retry transient failures inside each adapter (off by default).
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Guard every provider with a circuit breaker (off by default).
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    /// Cap requests per minute sent to one provider. Each user gets a third
    /// of it.
    pub fn rate_limit(mut self, provider: impl Into<String>, requests_per_minute: u32) -> Self {
        self.rate_limits.insert(provider.into(), requests_per_minute);
        self
    }

    /// Set the default per-provider-call timeout (default: 60s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Choose whether cache hits show up in usage metrics.
    pub fn cache_hit_accounting(mut self, accounting: CacheHitAccounting) -> Self {
        self.accounting = accounting;
        self
    }

    /// Warn once total cost crosses this amount (USD).
    pub fn monthly_budget(mut self, budget: f64) -> Self {
        self.monthly_budget = Some(budget);
        self
    }

    /// Don't spawn the background sweeper.
    ///
    /// Expired entries are still never served; they are only reclaimed when
    /// looked up again or when the cache is full. Lets the gateway be built
    /// outside a tokio runtime.
    pub fn disable_sweeper(mut self) -> Self {
        self.sweeper = false;
        self
    }

    /// Build the gateway.
    ///
    /// Spawns the cache sweeper, so this must run inside a tokio runtime
    /// unless [`disable_sweeper()`](Self::disable_sweeper) was called.
    pub fn build(self) -> Result<Gateway> {
        let adapters = self.adapters();
        if adapters.is_empty() {
            return Err(GatewayError::NoProvider);
        }

        let mut seen = HashSet::new();
        for adapter in &adapters {
            if !seen.insert(adapter.name()) {
                return Err(GatewayError::Configuration(format!(
                    "provider '{}' registered twice",
                    adapter.name()
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(GatewayError::Configuration("timeout must be positive".into()));
        }
        if self.sweeper && self.cache.sweep_interval.is_zero() {
            return Err(GatewayError::Configuration(
                "cache sweep interval must be positive".into(),
            ));
        }

        let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
        let router = TaskRouter::new(&self.routing, &names)?;
        debug!(providers = ?names, "registered providers");

        let mut rate_limits = BTreeMap::new();
        for (name, &rpm) in &self.rate_limits {
            if !names.contains(&name.as_str()) {
                return Err(GatewayError::Configuration(format!(
                    "rate limit set for unregistered provider '{name}'"
                )));
            }
            let rpm = NonZeroU32::new(rpm).ok_or_else(|| {
                GatewayError::Configuration(format!("rate limit for '{name}' must be positive"))
            })?;
            rate_limits.insert(name.as_str(), rpm);
        }
        if self
            .circuit_breaker
            .as_ref()
            .is_some_and(|config| config.failure_threshold == 0)
        {
            return Err(GatewayError::Configuration(
                "circuit breaker failure threshold must be positive".into(),
            ));
        }

        let mut circuits = BTreeMap::new();
        let adapters: Vec<Arc<dyn ProviderAdapter>> = adapters
            .iter()
            .map(|adapter| self.decorate(adapter.clone(), &rate_limits, &mut circuits))
            .collect();
        let coordinator = FailoverCoordinator::new(adapters);

        let cache = Arc::new(ResponseCache::new(&self.cache));
        let mut usage = UsageTracker::new();
        if let Some(budget) = self.monthly_budget {
            usage = usage.with_monthly_budget(budget);
        }

        let shutdown = CancellationToken::new();
        let sweeper = if self.sweeper {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(GatewayError::Configuration(
                    "cache sweeper needs a tokio runtime; call disable_sweeper() to build outside one"
                        .into(),
                ));
            }
            Some(spawn_sweeper(
                cache.clone(),
                self.cache.sweep_interval,
                shutdown.clone(),
            ))
        } else {
            None
        };

        Ok(Gateway {
            router,
            coordinator,
            cache,
            usage: Arc::new(usage),
            accounting: self.accounting,
            timeout: self.timeout,
            shutdown,
            sweeper: Mutex::new(sweeper),
            inflight: InFlight::new(),
            circuits,
        })
    }

    /// Wrap one adapter: retries innermost, then the circuit breaker, then
    /// the request quota. A refused quota never counts against the circuit,
    /// and a retry sequence counts as one call.
    fn decorate(
        &self,
        adapter: Arc<dyn ProviderAdapter>,
        rate_limits: &BTreeMap<&str, NonZeroU32>,
        circuits: &mut BTreeMap<String, Arc<CircuitBreakerProvider>>,
    ) -> Arc<dyn ProviderAdapter> {
        let mut adapter = adapter;
        if let Some(config) = &self.retry
            && config.max_attempts > 1
        {
            adapter = Arc::new(RetryingProvider::new(adapter, config.clone()));
        }
        if let Some(config) = &self.circuit_breaker {
            let breaker = Arc::new(CircuitBreakerProvider::new(adapter, config.clone()));
            circuits.insert(breaker.name().to_string(), breaker.clone());
            adapter = breaker;
        }
        if let Some(&rpm) = rate_limits.get(adapter.name()) {
            adapter = Arc::new(RateLimitedProvider::new(adapter, rpm));
        }
        adapter
    }

    /// Built-in adapters from keys (sharing one HTTP client), then custom ones.
    fn adapters(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        #[cfg(any(feature = "openai", feature = "anthropic", feature = "google"))]
        {
            let http = reqwest::Client::new();

            #[cfg(feature = "openai")]
            if let Some(ref key) = self.openai_key {
                adapters.push(Arc::new(crate::providers::OpenAiProvider::with_http_client(
                    key.clone(),
                    http.clone(),
                )));
            }

            #[cfg(feature = "anthropic")]
            if let Some(ref key) = self.anthropic_key {
                adapters.push(Arc::new(
                    crate::providers::AnthropicProvider::with_http_client(key.clone(), http.clone()),
                ));
            }

            #[cfg(feature = "google")]
            if let Some(ref key) = self.google_key {
                adapters.push(Arc::new(crate::providers::GoogleProvider::with_http_client(
                    key.clone(),
                    http.clone(),
                )));
            }
        }

        adapters.extend(self.providers.iter().cloned());
        adapters
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
