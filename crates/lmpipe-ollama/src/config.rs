//! Ollama configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use lmpipe_core::{Error, Result, RetryConfig};

/// Configuration for the Ollama client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_URL.to_string(),
            chat_model: Self::DEFAULT_CHAT_MODEL.to_string(),
            embed_model: Self::DEFAULT_EMBED_MODEL.to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl OllamaConfig {
    pub const DEFAULT_URL: &'static str = "http://localhost:11434";
    pub const DEFAULT_CHAT_MODEL: &'static str = "gemma3:4b";
    pub const DEFAULT_EMBED_MODEL: &'static str = "snowflake-arctic-embed:33m";

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let base_url = env::var("OLLAMA_HOST").unwrap_or(defaults.base_url);
        let chat_model = env::var("OLLAMA_CHAT_MODEL").unwrap_or(defaults.chat_model);
        let embed_model = env::var("OLLAMA_EMBED_MODEL").unwrap_or(defaults.embed_model);

        let timeout_secs = match env::var("OLLAMA_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| Error::Configuration(
                format!("OLLAMA_TIMEOUT_SECS must be a whole number of seconds, got '{}'", raw)
            ))?,
            Err(_) => defaults.timeout_secs,
        };

        let max_retries = match env::var("OLLAMA_MAX_RETRIES") {
            Ok(raw) => raw.parse().map_err(|_| Error::Configuration(
                format!("OLLAMA_MAX_RETRIES must be a whole number, got '{}'", raw)
            ))?,
            Err(_) => defaults.max_retries,
        };

        Self::new(base_url)
            .map(|config| Self {
                chat_model,
                embed_model,
                timeout_secs,
                max_retries,
                ..config
            })
    }

    /// Create configuration for a server URL with default models
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_url(&base_url.into())?;
        Ok(Self {
            base_url,
            ..Default::default()
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

/// Accept `host:port` as well as full URLs, the way the Ollama CLI does
fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Configuration("Ollama host must not be empty".to_string()));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{}", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("http://localhost:11434/").unwrap(), "http://localhost:11434");
        assert_eq!(normalize_url("127.0.0.1:11434").unwrap(), "http://127.0.0.1:11434");
        assert_eq!(normalize_url("https://ollama.internal").unwrap(), "https://ollama.internal");
        assert!(normalize_url("  ").is_err());
    }

    #[test]
    fn test_new_keeps_default_models() {
        let config = OllamaConfig::new("gpu-box:11434").unwrap();
        assert_eq!(config.base_url, "http://gpu-box:11434");
        assert_eq!(config.chat_model, OllamaConfig::DEFAULT_CHAT_MODEL);
        assert_eq!(config.embed_model, OllamaConfig::DEFAULT_EMBED_MODEL);
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }
}
