//! The gateway: cache → route → failover → account → cache.

mod builder;
mod submit;

pub use builder::GatewayBuilder;
pub use submit::{Gateway, SubmitOptions};
