//! Document metadata.
//!
//! The core never handles raw file bytes; it stores metadata plus the text
//! already extracted at upload time, and the reply pipeline consumes that
//! text through the [`DocumentTextSource`](crate::store::DocumentTextSource)
//! contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded document attached to a user (and optionally a chat).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,

    /// The owning user
    pub user_id: Uuid,

    /// The chat this document was uploaded for, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,

    /// Original file name
    pub name: String,

    /// MIME type reported at upload
    pub mime_type: String,

    /// Size of the uploaded file in bytes
    pub size_bytes: i64,

    /// Text extracted at upload time, capped by `Limits::max_file_text_chars`
    #[serde(default)]
    pub extracted_text: String,

    /// When the document was uploaded
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document record.
    pub fn new(
        user_id: Uuid,
        chat_id: Option<Uuid>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: i64,
        extracted_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            chat_id,
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            extracted_text: extracted_text.into(),
            created_at: Utc::now(),
        }
    }

    /// A short excerpt of the extracted text for listings.
    pub fn excerpt(&self, max_chars: usize) -> String {
        self.extracted_text.chars().take(max_chars).collect()
    }
}
