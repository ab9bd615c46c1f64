//! # Counsel Core
//!
//! Domain types, traits, and error definitions for the Counsel chat backend.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (storage, generation backend, enrichment) is
//! defined as a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with in-memory/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod chat;
pub mod document;
pub mod error;
pub mod generate;
pub mod limits;
pub mod message;
pub mod store;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use chat::{Chat, ChatStatus};
pub use document::Document;
pub use error::{GenerationError, ReplyError, StoreError};
pub use generate::{Enricher, Generator};
pub use limits::Limits;
pub use message::{Message, Role};
pub use store::{ChatStore, DocumentStore, DocumentTextSource, MessageStore, UserStore};
pub use user::User;
