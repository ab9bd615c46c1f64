//! # Counsel Chat
//!
//! The reply pipeline: everything between an incoming user request and a
//! persisted assistant answer.
//!
//! The one real design constraint here is the prompt bound. Every input to
//! the prompt (history, documents, the request itself) is untrusted in
//! length, and the composed prompt must never exceed
//! `Limits::max_prompt_chars`. A per-call [`PromptBudget`] enforces that
//! bound deterministically; [`compose`] owns a fresh budget for every call,
//! so requests can never interleave allocations.
//!
//! Pipeline modules, leaf-first:
//! - [`budget`] — the character budget allocator
//! - [`history`] — recent turns, reversed to chronological order, rendered flat
//! - [`documents`] — attached-document text, tolerant of per-document failures
//! - [`scenario`] — scenario code → specialized system instruction
//! - [`prompt`] — section assembly under the budget
//! - [`reply`] — the orchestrator tying it all together

pub mod budget;
pub mod documents;
pub mod history;
pub mod prompt;
pub mod reply;
pub mod scenario;

pub use budget::PromptBudget;
pub use prompt::{compose, DEFAULT_SYSTEM_INSTRUCTION, SYSTEM_INSTRUCTION_CAP};
pub use reply::ReplyService;
pub use scenario::{catalog, instruction_for, Scenario};
