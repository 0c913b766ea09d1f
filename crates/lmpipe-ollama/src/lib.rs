//! Ollama integration for lmpipe
//!
//! This crate provides the Ollama implementation of the `LLMProvider` and
//! `EmbeddingProvider` traits over the server's HTTP API.

mod client;
mod config;


pub use client::OllamaClient;
pub use config::OllamaConfig;

// Re-export core types for convenience
pub use lmpipe_core::{
    LLMProvider, EmbeddingProvider, GenerationConfig, GenerationResult,
    ChatMessage, ChatRole, RetryConfig, Error, Result,
};
