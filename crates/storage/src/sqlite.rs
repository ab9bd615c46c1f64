//! SQLite store — the default backend.
//!
//! One database file holds four tables: `users`, `chats`, `messages`, and
//! `documents`. Messages reference chats with `ON DELETE CASCADE` so a
//! chat and its history disappear together. Timestamps are stored as
//! RFC 3339 text, IDs as canonical UUID text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use counsel_core::{
    Chat, ChatStatus, ChatStore, Document, DocumentStore, DocumentTextSource, Message,
    MessageStore, Role, StoreError, User, UserStore,
};

/// A SQLite-backed implementation of every store contract.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database and run migrations.
    ///
    /// Accepts a `sqlite://` URL or a bare path. Pass `"sqlite::memory:"`
    /// for an in-process ephemeral database (useful for tests); in-memory
    /// databases are pinned to a single connection so every query sees the
    /// same data.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                email         TEXT UNIQUE NOT NULL,
                name          TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                is_active     INTEGER NOT NULL DEFAULT 1,
                created_at    TEXT NOT NULL,
                last_login_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                title           TEXT,
                status          TEXT NOT NULL DEFAULT 'active',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                last_message_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chats table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id         TEXT PRIMARY KEY,
                chat_id    TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL,
                latency_ms INTEGER,
                truncated  INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_chat_created
             ON messages(chat_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                chat_id        TEXT,
                name           TEXT NOT NULL,
                mime_type      TEXT NOT NULL,
                size_bytes     INTEGER NOT NULL,
                extracted_text TEXT NOT NULL DEFAULT '',
                created_at     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("documents table: {e}")))?;

        Ok(())
    }
}

// --- Row mapping ---

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::QueryFailed(format!("bad UUID: {e}")))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp: {e}")))
}

fn column<'r, T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>>(
    row: &'r SqliteRow,
    name: &str,
) -> Result<T, StoreError> {
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("column {name}: {e}")))
}

fn row_to_chat(row: &SqliteRow) -> Result<Chat, StoreError> {
    Ok(Chat {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        user_id: parse_uuid(&column::<String>(row, "user_id")?)?,
        title: column::<Option<String>>(row, "title")?,
        status: column::<String>(row, "status")?
            .parse::<ChatStatus>()
            .map_err(StoreError::QueryFailed)?,
        created_at: parse_time(&column::<String>(row, "created_at")?)?,
        updated_at: parse_time(&column::<String>(row, "updated_at")?)?,
        last_message_at: parse_time(&column::<String>(row, "last_message_at")?)?,
    })
}

fn row_to_message(row: &SqliteRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        chat_id: parse_uuid(&column::<String>(row, "chat_id")?)?,
        role: column::<String>(row, "role")?
            .parse::<Role>()
            .map_err(StoreError::QueryFailed)?,
        content: column::<String>(row, "content")?,
        created_at: parse_time(&column::<String>(row, "created_at")?)?,
        latency_ms: column::<Option<i64>>(row, "latency_ms")?,
        truncated: column::<bool>(row, "truncated")?,
    })
}

fn row_to_user(row: &SqliteRow) -> Result<User, StoreError> {
    let last_login_at = column::<Option<String>>(row, "last_login_at")?
        .map(|t| parse_time(&t))
        .transpose()?;
    Ok(User {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        email: column::<String>(row, "email")?,
        name: column::<String>(row, "name")?,
        password_hash: column::<String>(row, "password_hash")?,
        is_active: column::<bool>(row, "is_active")?,
        created_at: parse_time(&column::<String>(row, "created_at")?)?,
        last_login_at,
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document, StoreError> {
    let chat_id = column::<Option<String>>(row, "chat_id")?
        .map(|id| parse_uuid(&id))
        .transpose()?;
    Ok(Document {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        user_id: parse_uuid(&column::<String>(row, "user_id")?)?,
        chat_id,
        name: column::<String>(row, "name")?,
        mime_type: column::<String>(row, "mime_type")?,
        size_bytes: column::<i64>(row, "size_bytes")?,
        extracted_text: column::<String>(row, "extracted_text")?,
        created_at: parse_time(&column::<String>(row, "created_at")?)?,
    })
}

fn storage_err(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::QueryFailed(e.to_string())
}

// --- Trait implementations ---

#[async_trait]
impl ChatStore for SqliteStore {
    async fn create(&self, chat: &Chat) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chats (id, user_id, title, status, created_at, updated_at, last_message_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(chat.id.to_string())
        .bind(chat.user_id.to_string())
        .bind(&chat.title)
        .bind(chat.status.as_str())
        .bind(chat.created_at.to_rfc3339())
        .bind(chat.updated_at.to_rfc3339())
        .bind(chat.last_message_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?1")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(row_to_chat).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Chat>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chats WHERE user_id = ?1 ORDER BY updated_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(row_to_chat).collect()
    }

    async fn rename(&self, chat_id: Uuid, title: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn touch(&self, chat_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE chats SET last_message_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(at.to_rfc3339())
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, chat_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chats WHERE id = ?1")
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, role, content, created_at, latency_ms, truncated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(message.id.to_string())
        .bind(message.chat_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .bind(message.latency_ms)
        .bind(message.truncated)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn recent(&self, chat_id: Uuid, n: usize) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(chat_id.to_string())
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        rows.iter().map(row_to_message).collect()
    }

    async fn list(
        &self,
        chat_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ?1
             ORDER BY created_at ASC, rowid ASC LIMIT ?2 OFFSET ?3",
        )
        .bind(chat_id.to_string())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        rows.iter().map(row_to_message).collect()
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, is_active, created_at, last_login_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at.to_rfc3339())
        .bind(user.last_login_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(Utc::now().to_rfc3339())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, document: &Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (id, user_id, chat_id, name, mime_type, size_bytes, extracted_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(document.id.to_string())
        .bind(document.user_id.to_string())
        .bind(document.chat_id.map(|id| id.to_string()))
        .bind(&document.name)
        .bind(&document.mime_type)
        .bind(document.size_bytes)
        .bind(&document.extracted_text)
        .bind(document.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, document_id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
            .bind(document_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM documents WHERE user_id = ?1 ORDER BY created_at DESC")
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(query_err)?;
        rows.iter().map(row_to_document).collect()
    }
}

#[async_trait]
impl DocumentTextSource for SqliteStore {
    async fn text_of(&self, document_id: Uuid) -> Result<String, StoreError> {
        let row = sqlx::query("SELECT extracted_text FROM documents WHERE id = ?1")
            .bind(document_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        match row {
            Some(row) => column::<String>(&row, "extracted_text"),
            None => Err(StoreError::Storage(format!(
                "document {document_id} not found"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn test_user() -> User {
        User::new("owner@example.com", "Owner", "$argon2id$stub")
    }

    #[tokio::test]
    async fn chat_roundtrip() {
        let store = test_store().await;
        let chat = Chat::new(Uuid::new_v4(), Some("Taxes".into()));
        ChatStore::create(&store, &chat).await.unwrap();

        let loaded = ChatStore::get(&store, chat.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, chat.id);
        assert_eq!(loaded.title.as_deref(), Some("Taxes"));
        assert_eq!(loaded.status, ChatStatus::Active);
    }

    #[tokio::test]
    async fn missing_chat_is_none() {
        let store = test_store().await;
        assert!(ChatStore::get(&store, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_bounded() {
        let store = test_store().await;
        let chat = Chat::new(Uuid::new_v4(), None);
        ChatStore::create(&store, &chat).await.unwrap();

        for content in ["one", "two", "three"] {
            store
                .append(&Message::user(chat.id, content))
                .await
                .unwrap();
        }

        let recent = store.recent(chat.id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "three");
        assert_eq!(recent[1].content, "two");
    }

    #[tokio::test]
    async fn list_pages_oldest_first() {
        let store = test_store().await;
        let chat = Chat::new(Uuid::new_v4(), None);
        ChatStore::create(&store, &chat).await.unwrap();

        for content in ["one", "two", "three"] {
            store
                .append(&Message::user(chat.id, content))
                .await
                .unwrap();
        }

        let page = store.list(chat.id, 2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "two");
        assert_eq!(page[1].content, "three");
    }

    #[tokio::test]
    async fn message_latency_and_truncation_survive() {
        let store = test_store().await;
        let chat = Chat::new(Uuid::new_v4(), None);
        ChatStore::create(&store, &chat).await.unwrap();

        let msg = Message::assistant(chat.id, "answer")
            .with_latency(321)
            .with_truncated(true);
        store.append(&msg).await.unwrap();

        let loaded = &store.recent(chat.id, 1).await.unwrap()[0];
        assert_eq!(loaded.latency_ms, Some(321));
        assert!(loaded.truncated);
    }

    #[tokio::test]
    async fn rename_changes_title_and_updated_at() {
        let store = test_store().await;
        let chat = Chat::new(Uuid::new_v4(), None);
        ChatStore::create(&store, &chat).await.unwrap();

        store.rename(chat.id, "Lease review").await.unwrap();

        let loaded = ChatStore::get(&store, chat.id).await.unwrap().unwrap();
        assert_eq!(loaded.title.as_deref(), Some("Lease review"));
        assert!(loaded.updated_at >= chat.updated_at);
    }

    #[tokio::test]
    async fn touch_advances_last_message_at() {
        let store = test_store().await;
        let chat = Chat::new(Uuid::new_v4(), None);
        ChatStore::create(&store, &chat).await.unwrap();

        let later = chat.last_message_at + chrono::Duration::seconds(60);
        store.touch(chat.id, later).await.unwrap();

        let loaded = ChatStore::get(&store, chat.id).await.unwrap().unwrap();
        assert!(loaded.last_message_at > chat.last_message_at);
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let store = test_store().await;
        let chat = Chat::new(Uuid::new_v4(), None);
        ChatStore::create(&store, &chat).await.unwrap();
        store
            .append(&Message::user(chat.id, "to be removed"))
            .await
            .unwrap();

        store.delete(chat.id).await.unwrap();
        assert!(ChatStore::get(&store, chat.id).await.unwrap().is_none());
        assert!(store.list(chat.id, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_roundtrip_and_last_login() {
        let store = test_store().await;
        let user = test_user();
        UserStore::create(&store, &user).await.unwrap();

        let loaded = store
            .get_by_email("owner@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, user.id);
        assert!(loaded.last_login_at.is_none());

        store.update_last_login(user.id).await.unwrap();
        let loaded = store
            .get_by_email("owner@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(loaded.last_login_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = test_store().await;
        UserStore::create(&store, &test_user()).await.unwrap();
        let result = UserStore::create(&store, &test_user()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn document_roundtrip_and_text_of() {
        let store = test_store().await;
        let user_id = Uuid::new_v4();
        let doc = Document::new(
            user_id,
            None,
            "lease.txt",
            "text/plain",
            20,
            "the lease agreement",
        );
        DocumentStore::create(&store, &doc).await.unwrap();

        let loaded = DocumentStore::get(&store, doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "lease.txt");
        assert_eq!(store.text_of(doc.id).await.unwrap(), "the lease agreement");

        let docs = DocumentStore::list_by_user(&store, user_id).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn text_of_missing_document_fails() {
        let store = test_store().await;
        assert!(store.text_of(Uuid::new_v4()).await.is_err());
    }
}
