//! Retrieval trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Query for RAG retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RAGQuery {
    pub query: String,
    pub top_k: usize,
}

impl RAGQuery {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self { query: query.into(), top_k }
    }
}

/// Result from RAG retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RAGResult {
    /// Retrieved passages, best match first
    pub passages: Vec<String>,
    pub context: String,
    pub metadata: Option<serde_json::Value>,
}

/// Trait for retrievers
///
/// A retriever finds the passages relevant to a query and turns them into
/// context for a generation prompt.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve relevant passages for a query
    async fn retrieve(&self, query: &RAGQuery) -> Result<RAGResult>;

    /// Build context from retrieved passages
    fn build_context(&self, passages: &[String]) -> String;

    /// Wrap a question with retrieved context
    async fn enhance_prompt(&self, prompt: &str, query: &RAGQuery) -> Result<String> {
        let result = self.retrieve(query).await?;

        let mut enhanced = String::new();
        enhanced.push_str("Use the following context to answer the question.\n\nCONTEXT:\n");
        enhanced.push_str(&result.context);
        enhanced.push_str("---\n\nQUESTION: ");
        enhanced.push_str(prompt);
        enhanced.push_str("\nANSWER: ");

        Ok(enhanced)
    }

    /// Get statistics about the retriever
    async fn stats(&self) -> Result<serde_json::Value>;
}
