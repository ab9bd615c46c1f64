//! Attached-document text for the prompt.
//!
//! Document context is best-effort by contract: one missing or unreadable
//! document must never abort the reply. Failing IDs are logged and
//! skipped; whatever resolved is still useful context.

use counsel_core::DocumentTextSource;
use tracing::warn;
use uuid::Uuid;

/// Resolve each document ID to its extracted text and concatenate the
/// non-empty results with a blank-line separator.
///
/// An empty or entirely-failing ID list yields an empty string.
pub async fn gather_documents(source: &dyn DocumentTextSource, document_ids: &[Uuid]) -> String {
    let mut texts: Vec<String> = Vec::new();

    for &document_id in document_ids {
        match source.text_of(document_id).await {
            Ok(text) if !text.is_empty() => texts.push(text),
            Ok(_) => {}
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "skipping unresolvable document");
            }
        }
    }

    texts.join("\n\n")
}
