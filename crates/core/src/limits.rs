//! Operational limits.
//!
//! One immutable struct holds every size and rate cap the backend enforces.
//! It is built once at startup from configuration and shared read-only by
//! all requests; per-request mutable state (the prompt budget) lives in
//! `counsel-chat`, not here.

use serde::{Deserialize, Serialize};

/// Maximum sizes and rates, supplied once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Hard cap on the total composed prompt, in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Maximum tokens the backend may generate per reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Maximum uploaded file size in bytes
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: usize,

    /// Maximum characters of text extracted from one file
    #[serde(default = "default_max_file_text_chars")]
    pub max_file_text_chars: usize,

    /// Per-section cap for the history section (documents share this class)
    #[serde(default = "default_max_history_chars")]
    pub max_history_chars: usize,

    /// Per-section cap for the user request section
    #[serde(default = "default_max_request_chars")]
    pub max_request_chars: usize,

    /// Rate limit per client per minute
    #[serde(default = "default_max_requests_per_min")]
    pub max_requests_per_min: usize,

    /// Process-wide cap on concurrent generation calls
    #[serde(default = "default_max_concurrent_llm")]
    pub max_concurrent_llm: usize,
}

fn default_max_prompt_chars() -> usize {
    10_000
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_max_file_size_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_max_file_text_chars() -> usize {
    100_000
}
fn default_max_history_chars() -> usize {
    50_000
}
fn default_max_request_chars() -> usize {
    50_000
}
fn default_max_requests_per_min() -> usize {
    60
}
fn default_max_concurrent_llm() -> usize {
    5
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_prompt_chars: default_max_prompt_chars(),
            max_output_tokens: default_max_output_tokens(),
            max_file_size_bytes: default_max_file_size_bytes(),
            max_file_text_chars: default_max_file_text_chars(),
            max_history_chars: default_max_history_chars(),
            max_request_chars: default_max_request_chars(),
            max_requests_per_min: default_max_requests_per_min(),
            max_concurrent_llm: default_max_concurrent_llm(),
        }
    }
}
