//! Response and token usage types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Token counts for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input.saturating_add(output),
        }
    }
}

/// Canonical response produced by a successful provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    /// Provider that actually answered (may differ from the chain's first entry).
    pub provider: String,
    /// Vendor's model identifier.
    pub model: String,
    pub tokens: TokenUsage,
    /// Cost in USD, derived from the provider's pricing table.
    pub cost: f64,
    pub duration: Duration,
    /// True only when served from the response cache.
    #[serde(default)]
    pub cached: bool,
}
