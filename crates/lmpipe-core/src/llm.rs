//! LLM and embedding provider traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;
use crate::types::ChatMessage;

/// Configuration for text generation
///
/// Unset sampling fields are left to the model server's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub temperature: Option<f32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    /// Context window size in tokens
    pub num_ctx: Option<u32>,
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "gemma3:4b".to_string(),
            temperature: Some(0.5),
            top_k: Some(40),
            top_p: Some(0.8),
            num_ctx: Some(8192),
            max_tokens: None,
            stop_sequences: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GenerationConfig {
    /// Suggested sampling ranges for grounded generation
    pub const TEMPERATURE_RANGE: (f32, f32) = (0.1, 0.5);
    pub const TOP_K_RANGE: (u32, u32) = (10, 50);
    pub const TOP_P_RANGE: (f32, f32) = (0.5, 0.9);

    /// Create a configuration for the given model with default sampling
    pub fn for_model(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    /// List the sampling parameters that fall outside the suggested ranges.
    ///
    /// Out-of-range values are still sent to the model; callers decide
    /// whether to surface the messages.
    pub fn recommended_range_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(t) = self.temperature {
            let (lo, hi) = Self::TEMPERATURE_RANGE;
            if !(lo..=hi).contains(&t) {
                warnings.push(format!("temperature {} is outside the suggested range {}-{}", t, lo, hi));
            }
        }
        if let Some(k) = self.top_k {
            let (lo, hi) = Self::TOP_K_RANGE;
            if !(lo..=hi).contains(&k) {
                warnings.push(format!("top_k {} is outside the suggested range {}-{}", k, lo, hi));
            }
        }
        if let Some(p) = self.top_p {
            let (lo, hi) = Self::TOP_P_RANGE;
            if !(lo..=hi).contains(&p) {
                warnings.push(format!("top_p {} is outside the suggested range {}-{}", p, lo, hi));
            }
        }

        warnings
    }
}

/// Result of a text generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// Trait for LLM providers (e.g., Ollama)
///
/// Both completion-style and chat-style generation are exposed; the
/// summarizer uses the former, the agent the latter.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<GenerationResult>;

    /// Generate the next assistant message for a conversation
    async fn chat(&self, messages: &[ChatMessage], config: &GenerationConfig) -> Result<GenerationResult>;

    /// Get the default model ID
    fn model_id(&self) -> &str;
}

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, input: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(inputs.len());
        for input in inputs {
            embeddings.push(self.embed(input).await?);
        }
        Ok(embeddings)
    }

    /// Get the embedding model ID
    fn embedding_model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_within_suggested_ranges() {
        assert!(GenerationConfig::default().recommended_range_warnings().is_empty());
    }

    #[test]
    fn test_out_of_range_sampling_is_reported() {
        let config = GenerationConfig {
            temperature: Some(0.9),
            top_k: Some(5),
            top_p: Some(0.95),
            ..GenerationConfig::for_model("qwen3:1.7b")
        };

        let warnings = config.recommended_range_warnings();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].starts_with("temperature 0.9"));
        assert!(warnings[1].starts_with("top_k 5"));
        assert!(warnings[2].starts_with("top_p 0.95"));
    }

    #[test]
    fn test_unset_sampling_is_not_reported() {
        let config = GenerationConfig {
            temperature: None,
            top_k: None,
            top_p: None,
            ..Default::default()
        };
        assert!(config.recommended_range_warnings().is_empty());
    }
}
