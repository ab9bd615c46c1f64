//! Error types for the Counsel domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; `ReplyError` is the
//! taxonomy the reply pipeline surfaces to callers.

use thiserror::Error;

/// Errors surfaced by the reply pipeline.
///
/// The first three variants are rejected before any side effect.
/// `Persistence` and `Generation` are fatal mid-pipeline: the pipeline
/// aborts immediately, and turns already committed stay committed.
/// Best-effort failures (document resolution, conversation touch) never
/// appear here; they are logged and swallowed.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The user text was empty after trimming.
    #[error("user text cannot be empty")]
    InvalidInput,

    /// The chat does not exist.
    #[error("chat not found")]
    NotFound,

    /// The chat belongs to a different user.
    #[error("access denied: chat belongs to a different user")]
    AccessDenied,

    /// A required store operation failed.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// The generation backend failed, timed out, or returned nothing usable.
    #[error("generation failure: {0}")]
    Generation(#[from] GenerationError),
}

// --- Bounded context errors ---

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("migration failed: {0}")]
    MigrationFailed(String),
}

/// Errors from the generation backend.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("backend returned status {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("backend returned an empty response")]
    EmptyResponse,
}
