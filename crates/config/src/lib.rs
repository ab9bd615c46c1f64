//! Configuration loading, validation, and management for Counsel.
//!
//! Loads configuration from `counsel.toml` in the working directory (or a
//! path given via `COUNSEL_CONFIG`) with environment variable overrides.
//! Validates all settings at startup.

use counsel_core::Limits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `counsel.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Generation backend settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Size and rate limits
    #[serde(default)]
    pub limits: Limits,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("auth", &self.auth)
            .field("llm", &self.llm)
            .field("limits", &self.limits)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL. `sqlite://` and `postgres://` schemes are supported.
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://counsel.db".into()
}
fn default_max_connections() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for bearer tokens. Required to start the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Token lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

fn default_token_ttl_hours() -> u64 {
    24
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &redact(&self.secret))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend kind: "ollama" (default) or "openai"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of the backend
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API key for hosted backends (Ollama needs none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Deadline for one generation call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether to enrich user requests with web-search results
    #[serde(default)]
    pub enable_web_search: bool,
}

fn default_backend() -> String {
    "ollama".into()
}
fn default_llm_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.1:8b".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    0.9
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
            enable_web_search: false,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("timeout_secs", &self.timeout_secs)
            .field("enable_web_search", &self.enable_web_search)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (`./counsel.toml`, or the
    /// file named by `COUNSEL_CONFIG`).
    ///
    /// Environment variable overrides (highest priority):
    /// - `COUNSEL_DATABASE_URL`
    /// - `COUNSEL_AUTH_SECRET`
    /// - `COUNSEL_LLM_BASE_URL`
    /// - `COUNSEL_LLM_MODEL`
    /// - `COUNSEL_LLM_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("COUNSEL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("counsel.toml"));
        let mut config = Self::load_from(&path)?;

        if let Ok(url) = std::env::var("COUNSEL_DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(secret) = std::env::var("COUNSEL_AUTH_SECRET") {
            config.auth.secret = Some(secret);
        }
        if let Ok(base_url) = std::env::var("COUNSEL_LLM_BASE_URL") {
            config.llm.base_url = base_url;
        }
        if let Ok(model) = std::env::var("COUNSEL_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(api_key) = std::env::var("COUNSEL_LLM_API_KEY") {
            config.llm.api_key = Some(api_key);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.limits.max_prompt_chars == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_prompt_chars must be greater than 0".into(),
            ));
        }

        if self.limits.max_concurrent_llm == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_concurrent_llm must be greater than 0".into(),
            ));
        }

        if !matches!(self.llm.backend.as_str(), "ollama" | "openai") {
            return Err(ConfigError::ValidationError(format!(
                "llm.backend must be \"ollama\" or \"openai\", got \"{}\"",
                self.llm.backend
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.limits.max_prompt_chars, 10_000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.llm.model, config.llm.model);
        assert_eq!(parsed.limits, config.limits);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            llm: LlmConfig {
                temperature: 5.0,
                ..LlmConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let config = AppConfig {
            llm: LlmConfig {
                backend: "bedrock".into(),
                ..LlmConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_prompt_limit_rejected() {
        let mut config = AppConfig::default();
        config.limits.max_prompt_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/counsel.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().server.port, 8080);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
port = 9090

[limits]
max_prompt_chars = 200
max_history_chars = 80
max_request_chars = 60
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.limits.max_prompt_chars, 200);
        assert_eq!(config.limits.max_history_chars, 80);
        assert_eq!(config.limits.max_output_tokens, 2048);
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("ollama"));
        assert!(toml_str.contains("8080"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            auth: AuthConfig {
                secret: Some("hmac-key-material".into()),
                ..AuthConfig::default()
            },
            llm: LlmConfig {
                api_key: Some("sk-secret".into()),
                ..LlmConfig::default()
            },
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hmac-key-material"));
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
