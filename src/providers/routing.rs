//! Task routing: which providers to try, in which order, for each task kind.
//!
//! This module provides:
//! - [`RoutingConfig`]: optional per-kind chain overrides
//! - [`TaskRouter`]: the resolved, immutable kind → chain table
//!
//! # Chain resolution
//!
//! For each [`TaskKind`], the router starts from the configured chain, or
//! from [`default_chain()`] when none is configured, then:
//!
//! 1. drops providers that are not registered,
//! 2. drops duplicates, keeping the first occurrence,
//! 3. for default chains only, falls back to registration order when
//!    nothing is left (e.g. a gateway built only from custom adapters).
//!
//! An explicitly configured chain that resolves to nothing is a
//! configuration error. After construction every kind has a non-empty,
//! duplicate-free chain, so [`TaskRouter::select_chain()`] is total.
//!
//! ```rust,ignore
//! Gateway::builder()
//!     .openai(openai_key)
//!     .anthropic(anthropic_key)
//!     .routing(RoutingConfig::new().chain(TaskKind::Chat, ["anthropic", "openai"]))
//!     .build()?
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::types::TaskKind;
use crate::{GatewayError, Result};

/// Per-kind provider chain overrides.
///
/// Unset kinds use [`default_chain()`]. Used by both the builder
/// (programmatic) and the CLI config (TOML):
///
/// ```toml
/// [routing]
/// chat = ["anthropic", "openai"]
/// legal = ["anthropic"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RoutingConfig {
    pub chains: BTreeMap<TaskKind, Vec<String>>,
}

impl RoutingConfig {
    /// Create an empty routing config (defaults for every kind).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chain for one kind.
    pub fn chain<I, S>(mut self, kind: TaskKind, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chains
            .insert(kind, providers.into_iter().map(Into::into).collect());
        self
    }
}

/// Built-in chain for a kind, over the built-in vendor names.
pub fn default_chain(kind: TaskKind) -> &'static [&'static str] {
    match kind {
        TaskKind::Chat | TaskKind::Creative => &["openai", "anthropic", "google"],
        TaskKind::Analysis | TaskKind::Legal | TaskKind::Coding => {
            &["anthropic", "openai", "google"]
        }
        TaskKind::Strategic => &["anthropic", "google", "openai"],
        TaskKind::Operational => &["google", "openai", "anthropic"],
    }
}

/// Resolved kind → provider chain table.
#[derive(Debug, Clone)]
pub struct TaskRouter {
    chains: [Vec<String>; TaskKind::COUNT],
}

impl TaskRouter {
    /// Resolve chains against the registered provider names (in
    /// registration order).
    pub fn new(config: &RoutingConfig, registered: &[&str]) -> Result<Self> {
        if registered.is_empty() {
            return Err(GatewayError::NoProvider);
        }

        let mut chains: [Vec<String>; TaskKind::COUNT] = Default::default();
        for kind in TaskKind::ALL {
            let chain = match config.chains.get(&kind) {
                Some(configured) => {
                    let chain = resolve(kind, configured.iter().map(String::as_str), registered);
                    if chain.is_empty() {
                        return Err(GatewayError::Configuration(format!(
                            "routing chain for '{kind}' names no registered provider"
                        )));
                    }
                    chain
                }
                None => {
                    let chain = resolve(kind, default_chain(kind).iter().copied(), registered);
                    if chain.is_empty() {
                        registered.iter().map(|s| s.to_string()).collect()
                    } else {
                        chain
                    }
                }
            };
            chains[kind.index()] = chain;
        }
        Ok(Self { chains })
    }

    /// Ordered provider chain for a kind: preferred provider first.
    pub fn select_chain(&self, kind: TaskKind) -> &[String] {
        &self.chains[kind.index()]
    }
}

fn resolve<'a>(
    kind: TaskKind,
    wanted: impl Iterator<Item = &'a str>,
    registered: &[&str],
) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    for name in wanted {
        if !registered.contains(&name) {
            warn!(%kind, provider = name, "routing names an unregistered provider, skipping");
            continue;
        }
        if !chain.iter().any(|existing| existing == name) {
            chain.push(name.to_string());
        }
    }
    chain
}
