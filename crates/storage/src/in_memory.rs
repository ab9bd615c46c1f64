//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use counsel_core::{
    Chat, ChatStore, Document, DocumentStore, DocumentTextSource, Message, MessageStore,
    StoreError, User, UserStore,
};

/// One store implementing every persistence contract over Vecs.
/// Useful for tests and sessions where persistence isn't needed.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<Vec<User>>,
    chats: RwLock<Vec<Chat>>,
    messages: RwLock<Vec<Message>>,
    documents: RwLock<Vec<Document>>,
    doc_texts: RwLock<HashMap<Uuid, String>>,
    fail_touches: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register extracted text for a document ID without a full document
    /// record (test convenience).
    pub async fn put_document_text(&self, document_id: Uuid, text: &str) {
        self.doc_texts
            .write()
            .await
            .insert(document_id, text.to_string());
    }

    /// Make every subsequent `touch` fail (test convenience).
    pub fn fail_touches(&self, fail: bool) {
        self.fail_touches.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    async fn create(&self, chat: &Chat) -> Result<(), StoreError> {
        self.chats.write().await.push(chat.clone());
        Ok(())
    }

    async fn get(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        Ok(self
            .chats
            .read()
            .await
            .iter()
            .find(|c| c.id == chat_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Chat>, StoreError> {
        let mut chats: Vec<Chat> = self
            .chats
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn rename(&self, chat_id: Uuid, title: &str) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        if let Some(chat) = chats.iter_mut().find(|c| c.id == chat_id) {
            chat.title = Some(title.to_string());
            chat.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn touch(&self, chat_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if self.fail_touches.load(Ordering::Relaxed) {
            return Err(StoreError::Storage("touch disabled".into()));
        }
        let mut chats = self.chats.write().await;
        if let Some(chat) = chats.iter_mut().find(|c| c.id == chat_id) {
            chat.last_message_at = at;
            chat.updated_at = at;
        }
        Ok(())
    }

    async fn delete(&self, chat_id: Uuid) -> Result<(), StoreError> {
        self.chats.write().await.retain(|c| c.id != chat_id);
        self.messages.write().await.retain(|m| m.chat_id != chat_id);
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn recent(&self, chat_id: Uuid, n: usize) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().await;
        // Append order is chronological; the contract wants newest-first.
        Ok(messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .rev()
            .take(n)
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        chat_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.users.write().await.push(user.clone());
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create(&self, document: &Document) -> Result<(), StoreError> {
        self.documents.write().await.push(document.clone());
        Ok(())
    }

    async fn get(&self, document_id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .find(|d| d.id == document_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let mut documents: Vec<Document> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }
}

#[async_trait]
impl DocumentTextSource for InMemoryStore {
    async fn text_of(&self, document_id: Uuid) -> Result<String, StoreError> {
        if let Some(text) = self.doc_texts.read().await.get(&document_id) {
            return Ok(text.clone());
        }
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.id == document_id)
            .map(|d| d.extracted_text.clone())
            .ok_or_else(|| StoreError::Storage(format!("document {document_id} not found")))
    }
}
