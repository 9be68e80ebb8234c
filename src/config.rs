//! Configuration loading for the `aigate` CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.aigate/config.toml` (user)
//! 3. `/etc/aigate/config.toml` (system)
//!
//! When no file is found the defaults apply. Secrets are loaded separately
//! with mandatory permission checks:
//! 1. `~/.aigate/secrets.toml` (user, must be 0600)
//! 2. `/etc/aigate/secrets.toml` (system, must be 0600)
//!
//! API keys missing from the secrets file fall back to `OPENAI_API_KEY`,
//! `ANTHROPIC_API_KEY` and `GOOGLE_API_KEY`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::providers::{CircuitBreakerConfig, Pricing, RetryConfig, RoutingConfig};
use crate::usage::CacheHitAccounting;
use crate::{CacheConfig, Gateway, GatewayError, Result};

/// CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub cache: CacheSection,
    /// Present ⇒ adapter-level retries are enabled.
    #[serde(default)]
    pub retry: Option<RetrySection>,
    /// Present ⇒ every provider gets a circuit breaker.
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerSection>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// Gateway-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    /// Per-provider-call timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub cache_hit_accounting: CacheHitAccounting,
    /// Advisory monthly budget in USD.
    #[serde(default)]
    pub monthly_budget: Option<f64>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            cache_hit_accounting: CacheHitAccounting::default(),
            monthly_budget: None,
        }
    }
}

fn default_timeout() -> u64 {
    60
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Entry time-to-live in seconds (default: 900).
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Sweep interval in seconds (default: 300).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    900
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_max_entries() -> usize {
    10_000
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new()
            .ttl(Duration::from_secs(section.ttl_secs))
            .sweep_interval(Duration::from_secs(section.sweep_interval_secs))
            .max_entries(section.max_entries)
    }
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig::new()
            .max_attempts(section.max_attempts)
            .initial_delay(Duration::from_millis(section.initial_delay_ms))
            .max_delay(Duration::from_millis(section.max_delay_ms))
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    30
}

impl From<&CircuitBreakerSection> for CircuitBreakerConfig {
    fn from(section: &CircuitBreakerSection) -> Self {
        CircuitBreakerConfig::new()
            .failure_threshold(section.failure_threshold)
            .reset_timeout(Duration::from_secs(section.reset_timeout_secs))
    }
}

/// Per-vendor overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<VendorConfig>,
    #[serde(default)]
    pub anthropic: Option<VendorConfig>,
    #[serde(default)]
    pub google: Option<VendorConfig>,
}

/// Settings for one built-in vendor adapter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    /// Local per-minute request quota; each user gets a third of it.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
    /// Set to `false` to skip this vendor even when a key is available.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
    #[serde(default)]
    pub anthropic: Option<ApiKeySecret>,
    #[serde(default)]
    pub google: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Provider name → environment variable name mapping.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("google", "GOOGLE_API_KEY"),
];

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first of
    /// `~/.aigate/config.toml` and `/etc/aigate/config.toml` that exists is
    /// used, or the defaults if neither does.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(GatewayError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aigate").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/aigate/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Build a gateway from this config and the given secrets.
    ///
    /// Vendors without a key (in secrets or the environment) are skipped.
    /// Must be called inside a tokio runtime.
    pub fn build_gateway(&self, secrets: &Secrets) -> Result<Gateway> {
        let mut builder = Gateway::builder()
            .routing(self.routing.clone())
            .cache(CacheConfig::from(&self.cache))
            .timeout(Duration::from_secs(self.gateway.timeout_secs))
            .cache_hit_accounting(self.gateway.cache_hit_accounting);

        if let Some(budget) = self.gateway.monthly_budget {
            builder = builder.monthly_budget(budget);
        }
        if let Some(retry) = &self.retry {
            builder = builder.retry(RetryConfig::from(retry));
        }
        if let Some(breaker) = &self.circuit_breaker {
            builder = builder.circuit_breaker(CircuitBreakerConfig::from(breaker));
        }

        let http = reqwest::Client::new();
        let vendor = |name: &str, section: &Option<VendorConfig>| -> Option<(String, VendorConfig)> {
            let section = section.clone().unwrap_or(VendorConfig {
                enabled: true,
                ..Default::default()
            });
            if !section.enabled {
                return None;
            }
            secrets.api_key(name).map(|key| (key, section))
        };

        macro_rules! register {
            ($name:literal, $section:expr, $adapter:ty) => {
                if let Some((key, section)) = vendor($name, $section) {
                    let mut adapter = <$adapter>::with_http_client(key, http.clone());
                    if let Some(model) = section.model {
                        adapter = adapter.model(model);
                    }
                    if let Some(url) = section.base_url {
                        adapter = adapter.base_url(url);
                    }
                    if let Some(pricing) = section.pricing {
                        adapter = adapter.with_pricing(pricing);
                    }
                    if let Some(rpm) = section.requests_per_minute {
                        builder = builder.rate_limit($name, rpm);
                    }
                    builder = builder.provider(Arc::new(adapter));
                }
            };
        }

        #[cfg(feature = "openai")]
        register!("openai", &self.providers.openai, crate::providers::OpenAiProvider);
        #[cfg(feature = "anthropic")]
        register!("anthropic", &self.providers.anthropic, crate::providers::AnthropicProvider);
        #[cfg(feature = "google")]
        register!("google", &self.providers.google, crate::providers::GoogleProvider);

        builder.build()
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.aigate/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/aigate/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".aigate").join("secrets.toml");
            if user_secrets.exists() {
                return Self::from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/aigate/secrets.toml");
        if system_secrets.exists() {
            return Self::from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Parse a secrets file after checking its permissions.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            GatewayError::Configuration(format!("failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(GatewayError::Configuration(format!(
                "secrets file {path:?} has insecure permissions {:o}; must be 0600 or 0400",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for a vendor, falling back to its environment variable.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        let from_file = match provider {
            "openai" => self.openai.as_ref(),
            "anthropic" => self.anthropic.as_ref(),
            "google" => self.google.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            PROVIDER_ENV_VARS
                .iter()
                .find(|(name, _)| *name == provider)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
                .filter(|key| !key.is_empty())
        })
    }
}
