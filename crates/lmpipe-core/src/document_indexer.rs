//! Document indexer trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A document to be indexed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub metadata: serde_json::Value,
}

impl Document {
    /// Build a document from raw text
    pub fn from_text(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            source: None,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Result of an indexing operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_indexed: usize,
    pub documents_failed: usize,
    pub errors: Vec<String>,
}

impl IndexingResult {
    /// Fold another result into this one
    pub fn merge(&mut self, other: IndexingResult) {
        self.documents_indexed += other.documents_indexed;
        self.documents_failed += other.documents_failed;
        self.errors.extend(other.errors);
    }
}

/// Trait for document indexers
///
/// An indexer turns documents into whatever units its retriever searches
/// over and writes them into a vector store.
#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    /// Index a single document
    async fn index_document(&self, document: Document) -> Result<IndexingResult>;

    /// Index multiple documents
    async fn index_documents(&self, documents: Vec<Document>) -> Result<IndexingResult> {
        let mut total = IndexingResult::default();
        for document in documents {
            let id = document.id.clone();
            match self.index_document(document).await {
                Ok(result) => total.merge(result),
                Err(e) => {
                    total.documents_failed += 1;
                    total.errors.push(format!("Failed to index document {}: {}", id, e));
                }
            }
        }
        Ok(total)
    }

    /// Index a document read from a local file
    async fn index_from_file(&self, path: &str) -> Result<IndexingResult>;

    /// Get indexing statistics
    async fn stats(&self) -> Result<serde_json::Value>;
}
