//! Generator trait — the abstraction over the text-generation backend.
//!
//! A Generator takes a fully composed prompt and returns the completion
//! text. It is synchronous from the pipeline's point of view (one call,
//! one answer, no streaming) and deadline-bound by the caller.
//!
//! Implementations: Ollama, OpenAI-compatible endpoints.

use async_trait::async_trait;

use crate::error::GenerationError;

/// The generation backend contract.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this backend (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Send the composed prompt and return the completion text.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] on transport failure, non-success
    /// status, or an empty completion. The caller wraps this call in a
    /// deadline and maps expiry to [`GenerationError::Timeout`].
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> Result<bool, GenerationError> {
        Ok(true)
    }
}

/// Optional text enrichment applied to the raw user request before prompt
/// composition (e.g. web-search augmentation).
///
/// Enrichment is best-effort by contract: implementations return the input
/// unchanged when they have nothing to add or when their upstream fails.
/// It runs entirely outside the prompt budget accounting; the composer
/// caps whatever comes back like any other user text.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, user_text: &str) -> String;
}
