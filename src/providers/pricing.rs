//! Per-vendor pricing tables and the canonical cost formula.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::types::{Response, Task, TokenUsage};

/// USD price per million tokens, split by direction.
///
/// Used by both adapters (programmatic) and the CLI config (TOML):
///
/// ```toml
/// [providers.openai]
/// pricing = { input_per_million = 0.15, output_per_million = 0.60 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// `input / 1e6 * price_in + output / 1e6 * price_out`.
    ///
    /// Accounting relies on this being a pure function of its inputs, so the
    /// operation order is fixed.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 / 1e6 * self.input_per_million
            + output_tokens as f64 / 1e6 * self.output_per_million
    }
}

/// Rough token estimate for vendors that do not report usage: one token per
/// four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// A vendor reply reduced to what the gateway needs.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl Completion {
    /// Turn the reply into a canonical [`Response`], estimating any missing
    /// token counts and pricing the call.
    pub fn into_response(
        self,
        provider: &str,
        pricing: &Pricing,
        task: &Task,
        started: Instant,
    ) -> Response {
        let input = self.input_tokens.unwrap_or_else(|| {
            estimate_tokens(task.effective_system_prompt()) + estimate_tokens(&task.prompt)
        });
        let output = self
            .output_tokens
            .unwrap_or_else(|| estimate_tokens(&self.content));
        Response {
            cost: pricing.cost(input, output),
            tokens: TokenUsage::new(input, output),
            content: self.content,
            provider: provider.to_string(),
            model: self.model,
            duration: started.elapsed(),
            cached: false,
        }
    }
}
