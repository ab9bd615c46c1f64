//! Chat domain type.
//!
//! A chat is a titled, user-owned container of ordered messages. Only the
//! owning user may read or extend it; ownership is checked by the reply
//! pipeline before any side effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Active,
    Archived,
}

impl ChatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for ChatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown chat status: {other}")),
        }
    }
}

/// A conversation owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Unique chat ID
    pub id: Uuid,

    /// The owning user, the only one allowed to read or extend this chat
    pub user_id: Uuid,

    /// Optional display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Active or archived
    #[serde(default)]
    pub status: ChatStatus,

    /// When this chat was created
    pub created_at: DateTime<Utc>,

    /// When this chat was last modified (title change, touch)
    pub updated_at: DateTime<Utc>,

    /// When the last message landed; advanced best-effort after each
    /// successful exchange
    pub last_message_at: DateTime<Utc>,
}

impl Chat {
    /// Create a new active chat for a user.
    pub fn new(user_id: Uuid, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            status: ChatStatus::Active,
            created_at: now,
            updated_at: now,
            last_message_at: now,
        }
    }

    /// Whether the given user owns this chat.
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
