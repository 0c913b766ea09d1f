//! Ollama HTTP client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use lmpipe_core::{
    LLMProvider, EmbeddingProvider, GenerationConfig, GenerationResult,
    ChatMessage, RetryConfig, Error, Result,
};

use crate::config::OllamaConfig;

/// Ollama client
pub struct OllamaClient {
    config: OllamaConfig,
    retry: RetryConfig,
    client: Client,
}

#[derive(Debug, Default, Serialize)]
struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

impl From<&GenerationConfig> for ModelOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            num_ctx: config.num_ctx,
            num_predict: config.max_tokens,
            stop: config.stop_sequences.clone(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: ModelOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ModelOptions,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            retry: config.retry(),
            config,
            client,
        })
    }

    /// Create a new Ollama client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = OllamaConfig::from_env()?;
        Self::new(config)
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the chat model used when a request does not name one
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    /// Set the embedding model
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.config.embed_model = model.into();
        self
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn resolve_model<'a>(&'a self, config: &'a GenerationConfig) -> &'a str {
        if config.model_id.is_empty() {
            &self.config.chat_model
        } else {
            &config.model_id
        }
    }

    /// POST a JSON body, retrying transient failures
    async fn post_json<B, R>(&self, endpoint: &str, body: &B, request_timeout: Duration) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let mut attempt = 0;

        loop {
            let outcome = match timeout(request_timeout, self.send_once(&url, body)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not answer within {:?}",
                    endpoint, request_timeout
                ))),
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(endpoint, attempt, error = %e, "Ollama request failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_once<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            // 5xx usually means the model is still loading or the server is restarting
            if status.is_server_error() {
                return Err(Error::Network(format!(
                    "Ollama server error {}: {}",
                    status, error_text
                )));
            }
            return Err(Error::LLMProvider(format!(
                "Ollama request failed with status {}: {}",
                status, error_text
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        serde_json::from_str(&response_text).map_err(|e| {
            Error::Serialization(format!("{} - raw response: {}", e, response_text))
        })
    }
}

/// Remove `<think>...</think>` reasoning blocks emitted by reasoning models
pub(crate) fn strip_reasoning(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        cleaned.push_str(&rest[..start]);
        match rest[start..].find(CLOSE) {
            Some(end) => rest = &rest[start + end + CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    cleaned.push_str(rest);

    cleaned.trim().to_string()
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<GenerationResult> {
        let model = self.resolve_model(config);
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: ModelOptions::from(config),
        };

        debug!(model, prompt_chars = prompt.len(), "ollama generate");
        let response: GenerateResponse = self.post_json("/api/generate", &request, config.timeout).await?;

        let text = strip_reasoning(&response.response);
        if text.is_empty() {
            return Err(Error::LLMProvider(format!("Empty response from model {}", model)));
        }

        Ok(GenerationResult {
            text,
            model_id: model.to_string(),
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
        })
    }

    async fn chat(&self, messages: &[ChatMessage], config: &GenerationConfig) -> Result<GenerationResult> {
        let model = self.resolve_model(config);
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            options: ModelOptions::from(config),
        };

        debug!(model, messages = messages.len(), "ollama chat");
        let response: ChatResponse = self.post_json("/api/chat", &request, config.timeout).await?;

        let text = strip_reasoning(&response.message.content);
        if text.is_empty() {
            return Err(Error::LLMProvider(format!("Empty chat response from model {}", model)));
        }

        Ok(GenerationResult {
            text,
            model_id: model.to_string(),
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
        })
    }

    fn model_id(&self) -> &str {
        &self.config.chat_model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[input.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Ollama returned no embedding".to_string()))
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.config.embed_model,
            input: inputs,
        };

        let response: EmbedResponse = self
            .post_json("/api/embed", &request, self.config.timeout())
            .await?;

        if response.embeddings.len() != inputs.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings from {}, got {}",
                inputs.len(),
                self.config.embed_model,
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }

    fn embedding_model(&self) -> &str {
        &self.config.embed_model
    }
}
