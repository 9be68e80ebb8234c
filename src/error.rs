//! Gateway error types
//!
//! Two layers:
//!
//! - [`ProviderError`]: one vendor call failed. Recoverable: the failover
//!   coordinator records it and moves on to the next provider in the chain.
//! - [`GatewayError`]: what a caller of [`Gateway::submit()`](crate::Gateway::submit)
//!   can actually see. Intermediate provider failures only surface inside
//!   [`AllProvidersFailedError`].

use std::fmt;
use std::time::Duration;

/// Why a single provider call failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderFailure {
    // Network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    // Reply errors
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("empty response from model")]
    EmptyResponse,

    /// The chain named a provider that was never registered.
    #[error("provider not registered")]
    NotRegistered,

    // Local guards, raised before the vendor is called
    /// The provider's circuit breaker is open.
    #[error("circuit breaker open")]
    CircuitOpen,

    /// The gateway's own per-minute request quota for this provider is used up.
    #[error("request quota exhausted ({scope})")]
    QuotaExceeded { scope: String },
}

impl ProviderFailure {
    /// Whether retrying the same provider might succeed.
    ///
    /// Rate limits, transport errors, timeouts and 5xx replies are transient.
    /// Auth failures, 4xx replies and malformed bodies are permanent. So are
    /// open circuits and exhausted local quotas: the next provider in the
    /// chain is tried instead.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderFailure::RateLimited { .. }
            | ProviderFailure::Http(_)
            | ProviderFailure::Timeout(_) => true,
            ProviderFailure::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Server-provided backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderFailure::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// A failed call to one provider, tagged with the provider's name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{provider}: {cause}")]
pub struct ProviderError {
    pub provider: String,
    pub cause: ProviderFailure,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, cause: ProviderFailure) -> Self {
        Self {
            provider: provider.into(),
            cause,
        }
    }
}

/// Every provider in the chain failed. Carries the per-provider errors in
/// the order they were attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct AllProvidersFailedError {
    pub errors: Vec<ProviderError>,
}

impl fmt::Display for AllProvidersFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all providers failed")?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AllProvidersFailedError {}

/// Errors returned by the gateway.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    AllProvidersFailed(#[from] AllProvidersFailedError),

    #[error("request cancelled")]
    Cancelled,

    // Caller errors, rejected before routing
    #[error("unknown task kind: {0}")]
    UnknownTaskKind(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Construction errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Result type alias for a single provider call
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_failed_display_lists_providers_in_order() {
        let err = AllProvidersFailedError {
            errors: vec![
                ProviderError::new("alpha", ProviderFailure::AuthenticationFailed),
                ProviderError::new("beta", ProviderFailure::EmptyResponse),
            ],
        };
        let msg = err.to_string();
        let alpha = msg.find("alpha").unwrap();
        let beta = msg.find("beta").unwrap();
        assert!(msg.starts_with("all providers failed: "));
        assert!(alpha < beta);
    }

    #[test]
    fn gateway_error_is_transparent_over_all_failed() {
        let inner = AllProvidersFailedError { errors: vec![] };
        let err: GatewayError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
    }
}
