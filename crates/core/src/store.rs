//! Store traits — the narrow contracts the core reads and writes through.
//!
//! Implementations: SQLite, PostgreSQL, in-memory (for testing).
//! The reply pipeline only ever sees these traits, never a concrete
//! database, so the persistence layer can be swapped without touching
//! the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::chat::Chat;
use crate::document::Document;
use crate::error::StoreError;
use crate::message::Message;
use crate::user::User;

/// Chat persistence.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a new chat.
    async fn create(&self, chat: &Chat) -> Result<(), StoreError>;

    /// Fetch a chat by ID. `Ok(None)` when it does not exist.
    async fn get(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError>;

    /// All chats owned by a user, most recently updated first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Chat>, StoreError>;

    /// Change a chat's title.
    async fn rename(&self, chat_id: Uuid, title: &str) -> Result<(), StoreError>;

    /// Advance `last_message_at`. Callers treat failures as best-effort.
    async fn touch(&self, chat_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Delete a chat and its messages.
    async fn delete(&self, chat_id: Uuid) -> Result<(), StoreError>;
}

/// Message persistence. Append-only: messages are never edited in place.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to its chat.
    async fn append(&self, message: &Message) -> Result<(), StoreError>;

    /// The most recent `n` messages of a chat, **newest-first**.
    ///
    /// Consumers that need chronological order (the history reader does)
    /// must reverse explicitly; the contract is the storage-natural order.
    async fn recent(&self, chat_id: Uuid, n: usize) -> Result<Vec<Message>, StoreError>;

    /// A page of chat history for the UI, oldest-first.
    async fn list(
        &self,
        chat_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, StoreError>;
}

/// User account lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    /// Fetch a user by email. `Ok(None)` when no account matches.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Record a successful login. Callers treat failures as best-effort.
    async fn update_last_login(&self, user_id: Uuid) -> Result<(), StoreError>;
}

/// Document metadata persistence.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document record.
    async fn create(&self, document: &Document) -> Result<(), StoreError>;

    /// Fetch a document by ID. `Ok(None)` when it does not exist.
    async fn get(&self, document_id: Uuid) -> Result<Option<Document>, StoreError>;

    /// All documents owned by a user, newest upload first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Document>, StoreError>;
}

/// Resolves a document ID to its extracted text.
///
/// Each call fails independently; the document aggregator in `counsel-chat`
/// skips failing IDs rather than aborting the reply.
#[async_trait]
pub trait DocumentTextSource: Send + Sync {
    async fn text_of(&self, document_id: Uuid) -> Result<String, StoreError>;
}
