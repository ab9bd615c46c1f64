//! Ollama generation backend.
//!
//! Talks to a local Ollama daemon over its `/api/chat` endpoint,
//! non-streaming. The composed prompt is sent as a single user message;
//! section structure (SYSTEM/HISTORY/DOCUMENTS/USER) lives inside the
//! prompt text itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use counsel_config::LlmConfig;
use counsel_core::{GenerationError, Generator};

/// An Ollama-backed [`Generator`].
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

impl OllamaGenerator {
    /// Create a generator from the LLM configuration.
    pub fn from_config(config: &LlmConfig, max_output_tokens: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                top_p: self.top_p,
                num_predict: self.max_output_tokens,
            },
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Sending Ollama request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(e.to_string())
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Ollama returned error");
            return Err(GenerationError::Api {
                status_code: status,
                message,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| GenerationError::Api {
            status_code: status,
            message: format!("failed to parse response: {e}"),
        })?;

        if parsed.message.content.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(parsed.message.content)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize, Default)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}
