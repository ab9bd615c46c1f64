//! Backend selection.
//!
//! Builds the configured [`Generator`] from `LlmConfig`. Validation of the
//! backend name happens at config load; anything unrecognized here falls
//! back to Ollama, the local-first default.

use std::sync::Arc;

use counsel_config::LlmConfig;
use counsel_core::Generator;
use tracing::info;

use crate::{OllamaGenerator, OpenAiCompatGenerator};

/// Build the generator named by `config.backend`.
pub fn build_generator(config: &LlmConfig, max_output_tokens: u32) -> Arc<dyn Generator> {
    let generator: Arc<dyn Generator> = match config.backend.as_str() {
        "openai" => Arc::new(OpenAiCompatGenerator::from_config(config, max_output_tokens)),
        _ => Arc::new(OllamaGenerator::from_config(config, max_output_tokens)),
    };

    info!(backend = generator.name(), model = %config.model, "Generation backend selected");
    generator
}
