//! Task types: the canonical, provider-agnostic description of one AI request

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{GatewayError, Result};

/// System prompt used when a task does not supply its own.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant for freelancers and small agencies. \
     Answer accurately and concisely.";

const DEFAULT_MAX_TOKENS: u32 = 1_000;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Kind of work a task asks for. Decides the provider chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Chat,
    Analysis,
    Creative,
    Legal,
    Strategic,
    Operational,
    Coding,
}

impl TaskKind {
    /// Number of task kinds.
    pub const COUNT: usize = 7;

    /// Every task kind, in declaration order.
    pub const ALL: [TaskKind; Self::COUNT] = [
        TaskKind::Chat,
        TaskKind::Analysis,
        TaskKind::Creative,
        TaskKind::Legal,
        TaskKind::Strategic,
        TaskKind::Operational,
        TaskKind::Coding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Chat => "chat",
            TaskKind::Analysis => "analysis",
            TaskKind::Creative => "creative",
            TaskKind::Legal => "legal",
            TaskKind::Strategic => "strategic",
            TaskKind::Operational => "operational",
            TaskKind::Coding => "coding",
        }
    }

    /// Position in [`TaskKind::ALL`].
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GatewayError::UnknownTaskKind(s.to_string()))
    }
}

/// One AI request.
///
/// `context` is carried through for the caller's benefit but is not part of
/// the cache fingerprint. `user_id` is used for cost attribution only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Task {
    pub fn new(kind: TaskKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            system_prompt: None,
            context: BTreeMap::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            user_id: None,
        }
    }

    /// Shorthand for a [`TaskKind::Chat`] task.
    pub fn chat(prompt: impl Into<String>) -> Self {
        Self::new(TaskKind::Chat, prompt)
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn user_id(mut self, user: impl Into<String>) -> Self {
        self.user_id = Some(user.into());
        self
    }

    /// The system prompt sent to providers: the task's own, or the default.
    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Reject tasks that must never reach a provider.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(GatewayError::InvalidInput("prompt is empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(GatewayError::InvalidInput(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(GatewayError::InvalidInput("max_tokens must be positive".into()));
        }
        Ok(())
    }
}
