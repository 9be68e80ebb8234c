//! Public types for the gateway API.

mod response;
mod task;

pub use response::{Response, TokenUsage};
pub use task::{DEFAULT_SYSTEM_PROMPT, Task, TaskKind};
