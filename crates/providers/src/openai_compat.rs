//! OpenAI-compatible generation backend.
//!
//! Works with OpenAI itself and with anything exposing a compatible
//! `/chat/completions` endpoint (OpenRouter, vLLM, Together, …). As with
//! the Ollama client, the composed prompt goes out as one user message.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use counsel_config::LlmConfig;
use counsel_core::{GenerationError, Generator};

/// An OpenAI-compatible [`Generator`].
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl OpenAiCompatGenerator {
    /// Create a generator from the LLM configuration.
    pub fn from_config(config: &LlmConfig, max_output_tokens: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_output_tokens,
            "stream": false,
        });

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
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
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Backend returned error");
            return Err(GenerationError::Api {
                status_code: status,
                message,
            });
        }

        let parsed: ApiResponse = response.json().await.map_err(|e| GenerationError::Api {
            status_code: status,
            message: format!("failed to parse response: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(content)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}
