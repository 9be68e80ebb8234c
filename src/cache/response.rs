//! Response cache: fingerprint → previously computed response.
//!
//! [`ResponseCache`] deduplicates identical recent tasks; identical tasks
//! still in flight are coalesced by the gateway before they get here. It sits in the
//! [`Gateway`](crate::Gateway) in front of routing: a hit bypasses routing,
//! failover and provider calls entirely.
//!
//! # Keying
//!
//! Entries are keyed on a [`Fingerprint`]: a hash of (`kind`, `prompt`,
//! effective system prompt). `context`, `max_tokens`, `temperature` and
//! `user_id` are not part of it. Each entry also stores the
//! key material it was written for; an entry whose stored key does not match
//! the looked-up task (a fingerprint collision) is treated as corrupt, dropped,
//! and reported as a miss.
//!
//! # Expiry
//!
//! `get` is correct on its own: an entry older than the TTL is a miss and is
//! removed on the spot. The background sweeper (see [`super::sweeper`]) only
//! reclaims memory for entries nobody asks for again. Both take the same
//! lock as `put`.
//!
//! # Ownership
//!
//! The cache owns its entries. `get` hands out clones with `cached = true`;
//! the stored copy keeps `cached = false`. Mutating a returned response
//! cannot affect the cache.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::{Response, Task, TaskKind};

/// Configuration for the response cache.
///
/// ```rust
/// # use aigate::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(60))
///     .sweep_interval(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum age of a servable entry. Default: 15 minutes.
    pub ttl: Duration,
    /// How often the background sweeper runs. Default: 5 minutes.
    pub sweep_interval: Duration,
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }
}

/// Deterministic hash identifying cache-equivalent tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint of a task.
    ///
    /// Uses `DefaultHasher::new()` (SipHash with fixed keys), which is
    /// deterministic across calls and processes built from the same
    /// toolchain. That is enough for an in-memory cache.
    pub fn of(task: &Task) -> Self {
        Self::from_parts(task.kind, &task.prompt, task.effective_system_prompt())
    }

    fn from_parts(kind: TaskKind, prompt: &str, system_prompt: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        prompt.hash(&mut hasher);
        system_prompt.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Key material an entry was written for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheKey {
    kind: TaskKind,
    prompt: String,
    system_prompt: String,
}

impl CacheKey {
    pub(crate) fn of(task: &Task) -> Self {
        Self {
            kind: task.kind,
            prompt: task.prompt.clone(),
            system_prompt: task.effective_system_prompt().to_string(),
        }
    }

    pub(crate) fn matches(&self, task: &Task) -> bool {
        self.kind == task.kind
            && self.prompt == task.prompt
            && self.system_prompt == task.effective_system_prompt()
    }
}

#[derive(Debug)]
struct CacheEntry {
    key: CacheKey,
    response: Response,
    created_at: Instant,
    hits: u64,
}

/// A looked-up entry did not belong to the task that hashed to it.
#[derive(Debug, thiserror::Error)]
#[error("cache entry for fingerprint {fingerprint:#x} was written for a different task")]
pub(crate) struct CacheCorruption {
    fingerprint: u64,
}

/// In-memory, mutex-guarded response cache with lazy TTL expiry.
pub struct ResponseCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached response for a task.
    ///
    /// Returns a clone with `cached = true` when a matching entry exists and
    /// is no older than the TTL. Expired and corrupt entries are dropped and
    /// reported as a miss. Emits cache hit/miss metrics.
    pub fn get(&self, task: &Task) -> Option<Response> {
        let fingerprint = Fingerprint::of(task);
        let now = Instant::now();
        let mut entries = self.lock();

        let outcome = match entries.get_mut(&fingerprint) {
            None => Lookup::Absent,
            Some(entry) if !entry.key.matches(task) => Lookup::Corrupt,
            Some(entry) if !self.is_fresh(entry, now) => Lookup::Expired,
            Some(entry) => {
                entry.hits = entry.hits.saturating_add(1);
                let mut response = entry.response.clone();
                response.cached = true;
                Lookup::Hit(response)
            }
        };

        match outcome {
            Lookup::Hit(response) => {
                drop(entries);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "kind" => task.kind.as_str())
                    .increment(1);
                debug!(kind = %task.kind, fingerprint = fingerprint.0, "cache hit");
                return Some(response);
            }
            Lookup::Corrupt => {
                entries.remove(&fingerprint);
                drop(entries);
                let err = CacheCorruption {
                    fingerprint: fingerprint.0,
                };
                warn!(error = %err, "dropping corrupt cache entry");
            }
            Lookup::Expired => {
                entries.remove(&fingerprint);
                drop(entries);
                debug!(kind = %task.kind, fingerprint = fingerprint.0, "cache entry expired");
            }
            Lookup::Absent => drop(entries),
        }

        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "kind" => task.kind.as_str())
            .increment(1);
        None
    }

    /// Store a response for a task, overwriting any existing entry.
    ///
    /// The stored copy always has `cached = false`. When the cache is full,
    /// expired entries are purged first, then the oldest entry is evicted.
    pub fn put(&self, task: &Task, response: &Response) {
        if self.config.max_entries == 0 {
            return;
        }
        let fingerprint = Fingerprint::of(task);
        let now = Instant::now();
        let mut entries = self.lock();

        if !entries.contains_key(&fingerprint) && entries.len() >= self.config.max_entries {
            let mut evicted = self.purge_expired(&mut entries, now);
            if entries.len() >= self.config.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(fp, _)| *fp);
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    evicted += 1;
                }
            }
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(evicted as u64);
        }

        let mut response = response.clone();
        response.cached = false;
        entries.insert(
            fingerprint,
            CacheEntry {
                key: CacheKey::of(task),
                response,
                created_at: now,
                hits: 0,
            },
        );
    }

    /// Remove every entry older than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let removed = self.purge_expired(&mut entries, now);
        drop(entries);
        if removed > 0 {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(removed as u64);
        }
        removed
    }

    /// How many times the entry for this task has been served.
    ///
    /// `None` if there is no entry (expiry is not checked).
    pub fn hits(&self, task: &Task) -> Option<u64> {
        let entries = self.lock();
        entries
            .get(&Fingerprint::of(task))
            .filter(|entry| entry.key.matches(task))
            .map(|entry| entry.hits)
    }

    /// Number of entries currently stored, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) <= self.config.ttl
    }

    fn purge_expired(&self, entries: &mut HashMap<Fingerprint, CacheEntry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry, now));
        before - entries.len()
    }

    /// The map holds plain data, so a panic elsewhere cannot leave it
    /// half-updated; recover from poisoning instead of propagating.
    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Lookup {
    Absent,
    Corrupt,
    Expired,
    Hit(Response),
}
