//! Message domain type.
//!
//! A message is one turn in a chat: the user asks, the assistant answers.
//! Messages are immutable once persisted: the store only appends, never
//! edits, so chat history stays a faithful record of the exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (persona, behavior rules)
    System,
    /// The end user
    User,
    /// The LLM assistant
    Assistant,
}

impl Role {
    /// The wire/storage name of this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn in a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,

    /// The chat this message belongs to
    pub chat_id: Uuid,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the message was created
    pub created_at: DateTime<Utc>,

    /// Generation latency in milliseconds (assistant turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,

    /// Whether part of the source text was cut to fit the prompt budget
    #[serde(default)]
    pub truncated: bool,
}

impl Message {
    /// Create a new user message.
    pub fn user(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(chat_id, Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(chat_id, Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(chat_id, Role::System, content)
    }

    fn new(chat_id: Uuid, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
            latency_ms: None,
            truncated: false,
        }
    }

    /// Attach a generation latency to this message.
    pub fn with_latency(mut self, latency_ms: i64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Mark this message as budget-truncated.
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}
