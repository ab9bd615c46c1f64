//! User domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account that owns chats and documents.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Login email (unique)
    pub email: String,

    /// Display name
    pub name: String,

    /// Argon2 password hash, never the plaintext
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Disabled accounts cannot log in
    pub is_active: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the user last logged in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new active user with an already-hashed password.
    pub fn new(email: impl Into<String>, name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            password_hash: password_hash.into(),
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }
}

// Keep the hash out of Debug output too.
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"[REDACTED]")
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("last_login_at", &self.last_login_at)
            .finish()
    }
}
