//! Generation backend clients for Counsel.
//!
//! Every backend implements `counsel_core::Generator`: one composed prompt
//! in, one completion out. The [`router`] picks the configured backend;
//! [`web_search`] provides the optional request enricher.

pub mod ollama;
pub mod openai_compat;
pub mod router;
pub mod web_search;

pub use ollama::OllamaGenerator;
pub use openai_compat::OpenAiCompatGenerator;
pub use router::build_generator;
pub use web_search::WebSearchEnricher;
