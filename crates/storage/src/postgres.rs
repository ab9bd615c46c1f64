//! PostgreSQL store.
//!
//! Same contracts as the SQLite backend, on a `PgPool` with native UUID and
//! TIMESTAMPTZ columns.
//!
//! # Feature gate
//!
//! This module is behind the `postgres` feature flag:
//!
//! ```toml
//! counsel-storage = { workspace = true, features = ["postgres"] }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use counsel_core::{
    Chat, ChatStatus, ChatStore, Document, DocumentStore, DocumentTextSource, Message,
    MessageStore, Role, StoreError, User, UserStore,
};

/// A PostgreSQL-backed implementation of every store contract.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("PostgreSQL store initialized");
        Ok(store)
    }

    /// Create from an existing connection pool.
    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            UUID PRIMARY KEY,
                email         TEXT UNIQUE NOT NULL,
                name          TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                is_active     BOOLEAN NOT NULL DEFAULT TRUE,
                created_at    TIMESTAMPTZ NOT NULL,
                last_login_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id              UUID PRIMARY KEY,
                user_id         UUID NOT NULL,
                title           TEXT,
                status          TEXT NOT NULL DEFAULT 'active',
                created_at      TIMESTAMPTZ NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL,
                last_message_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id         UUID PRIMARY KEY,
                chat_id    UUID NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                latency_ms BIGINT,
                truncated  BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_chat_created
            ON messages(chat_id, created_at)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id             UUID PRIMARY KEY,
                user_id        UUID NOT NULL,
                chat_id        UUID,
                name           TEXT NOT NULL,
                mime_type      TEXT NOT NULL,
                size_bytes     BIGINT NOT NULL,
                extracted_text TEXT NOT NULL DEFAULT '',
                created_at     TIMESTAMPTZ NOT NULL
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        }

        Ok(())
    }
}

// --- Row mapping ---

fn column<'r, T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>>(
    row: &'r PgRow,
    name: &str,
) -> Result<T, StoreError> {
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("column {name}: {e}")))
}

fn row_to_chat(row: &PgRow) -> Result<Chat, StoreError> {
    Ok(Chat {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        title: column(row, "title")?,
        status: column::<String>(row, "status")?
            .parse::<ChatStatus>()
            .map_err(StoreError::QueryFailed)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        last_message_at: column(row, "last_message_at")?,
    })
}

fn row_to_message(row: &PgRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: column(row, "id")?,
        chat_id: column(row, "chat_id")?,
        role: column::<String>(row, "role")?
            .parse::<Role>()
            .map_err(StoreError::QueryFailed)?,
        content: column(row, "content")?,
        created_at: column(row, "created_at")?,
        latency_ms: column(row, "latency_ms")?,
        truncated: column(row, "truncated")?,
    })
}

fn row_to_user(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: column(row, "id")?,
        email: column(row, "email")?,
        name: column(row, "name")?,
        password_hash: column(row, "password_hash")?,
        is_active: column(row, "is_active")?,
        created_at: column(row, "created_at")?,
        last_login_at: column(row, "last_login_at")?,
    })
}

fn row_to_document(row: &PgRow) -> Result<Document, StoreError> {
    Ok(Document {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        chat_id: column(row, "chat_id")?,
        name: column(row, "name")?,
        mime_type: column(row, "mime_type")?,
        size_bytes: column(row, "size_bytes")?,
        extracted_text: column(row, "extracted_text")?,
        created_at: column(row, "created_at")?,
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
impl ChatStore for PostgresStore {
    async fn create(&self, chat: &Chat) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chats (id, user_id, title, status, created_at, updated_at, last_message_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(chat.id)
        .bind(chat.user_id)
        .bind(&chat.title)
        .bind(chat.status.as_str())
        .bind(chat.created_at)
        .bind(chat.updated_at)
        .bind(chat.last_message_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(row_to_chat).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Chat>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chats WHERE user_id = $1 ORDER BY updated_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(row_to_chat).collect()
    }

    async fn rename(&self, chat_id: Uuid, title: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE chats SET title = $1, updated_at = now() WHERE id = $2")
            .bind(title)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn touch(&self, chat_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE chats SET last_message_at = $1, updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, chat_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, role, content, created_at, latency_ms, truncated)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .bind(message.latency_ms)
        .bind(message.truncated)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn recent(&self, chat_id: Uuid, n: usize) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = $1
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(chat_id)
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
            "SELECT * FROM messages WHERE chat_id = $1
             ORDER BY created_at ASC LIMIT $2 OFFSET $3",
        )
        .bind(chat_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        rows.iter().map(row_to_message).collect()
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, is_active, created_at, last_login_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn create(&self, document: &Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (id, user_id, chat_id, name, mime_type, size_bytes, extracted_text, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(document.id)
        .bind(document.user_id)
        .bind(document.chat_id)
        .bind(&document.name)
        .bind(&document.mime_type)
        .bind(document.size_bytes)
        .bind(&document.extracted_text)
        .bind(document.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, document_id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = $1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM documents WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(query_err)?;
        rows.iter().map(row_to_document).collect()
    }
}

#[async_trait]
impl DocumentTextSource for PostgresStore {
    async fn text_of(&self, document_id: Uuid) -> Result<String, StoreError> {
        let row = sqlx::query("SELECT extracted_text FROM documents WHERE id = $1")
            .bind(document_id)
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
