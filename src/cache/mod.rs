//! Response caching.
//!
//! - [`response::ResponseCache`]: fingerprint-keyed store with lazy TTL
//!   expiry, consulted by the gateway before routing.
//! - `inflight`: coalesces identical tasks that are still being answered.
//! - [`sweeper`]: background task that periodically purges expired
//!   entries until the gateway shuts down.

pub(crate) mod inflight;
pub mod response;
pub mod sweeper;

pub(crate) use inflight::InFlight;
pub use response::{CacheConfig, Fingerprint, ResponseCache};
pub use sweeper::spawn_sweeper;
