//! Parent-child ingestion and retrieval
//!
//! Child chunks are small, so their embeddings match queries precisely.
//! Parent chunks are large, so they give the model enough context to answer.
//! Every child carries the id of its parent; retrieval searches children and
//! returns their parents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lmpipe_core::{
    DocumentIndexer, Document, IndexingResult,
    Retriever, RAGQuery, RAGResult,
    VectorStore, VectorDocument, SearchConfig,
    EmbeddingProvider, Error, Result,
};

use crate::splitter::SentenceSplitter;

/// Stable id for a chunk: the hex SHA-256 of its text.
///
/// Re-ingesting identical text yields identical ids, so the store never
/// collects duplicates of the same chunk.
pub fn content_id(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// One `- {passage}` bullet per passage, each followed by a blank line
pub(crate) fn format_context(passages: &[String]) -> String {
    passages
        .iter()
        .map(|passage| format!("- {}\n\n", passage))
        .collect()
}

/// Chunk sizes for parent-child ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub parent_tokens: usize,
    pub parent_overlap: usize,
    pub child_tokens: usize,
    pub child_overlap: usize,
    /// Number of children retrieved per query
    pub n_results: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            parent_tokens: 256,
            parent_overlap: 32,
            child_tokens: 128,
            child_overlap: 16,
            n_results: 3,
        }
    }
}

/// A parent chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChunk {
    pub id: String,
    pub text: String,
}

/// Parent chunks keyed by id, in ingestion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentStore {
    chunks: Vec<ParentChunk>,
    /// Parents whose children are already in the vector store
    #[serde(default)]
    embedded: HashSet<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ParentStore {
    /// Insert a parent; returns false if identical text was already stored
    pub fn insert(&mut self, text: &str) -> bool {
        let id = content_id(text);
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.chunks.len());
        self.chunks.push(ParentChunk { id, text: text.to_string() });
        true
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.index.get(id).map(|&i| self.chunks[i].text.as_str())
    }

    pub fn chunks(&self) -> &[ParentChunk] {
        &self.chunks
    }

    pub fn has_children(&self, id: &str) -> bool {
        self.embedded.contains(id)
    }

    pub fn mark_children_stored(&mut self, id: &str) {
        if self.index.contains_key(id) {
            self.embedded.insert(id.to_string());
        }
    }

    /// Parents not yet split into stored children, in ingestion order
    pub fn pending(&self) -> Vec<ParentChunk> {
        self.chunks
            .iter()
            .filter(|chunk| !self.embedded.contains(&chunk.id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, serde_json::to_string(self)?).await?;
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let mut store: ParentStore = serde_json::from_str(&raw)
            .map_err(|e| Error::DocumentIndexer(format!("Corrupt parent store {}: {}", path.display(), e)))?;
        store.index = store
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (chunk.id.clone(), i))
            .collect();
        Ok(store)
    }
}

/// Timings and counts of one ingest-and-retrieve run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub config: IngestConfig,
    pub parent_count: usize,
    pub parent_secs: f64,
    pub child_count: usize,
    pub child_secs: f64,
    pub query: String,
    pub retrieved: Vec<String>,
    pub context: String,
    pub retrieval_secs: f64,
}

/// Parent-child ingester over any vector store and embedding provider
pub struct ParentChildIngester<V: VectorStore, E: EmbeddingProvider> {
    vector_store: Arc<V>,
    embedder: Arc<E>,
    config: IngestConfig,
    parents: RwLock<ParentStore>,
}

impl<V: VectorStore, E: EmbeddingProvider> ParentChildIngester<V, E> {
    /// Create a new ingester
    pub fn new(vector_store: Arc<V>, embedder: Arc<E>, config: IngestConfig) -> Result<Self> {
        // reject bad chunk sizes before any work is done
        SentenceSplitter::new(config.parent_tokens, config.parent_overlap)?;
        SentenceSplitter::new(config.child_tokens, config.child_overlap)?;

        Ok(Self {
            vector_store,
            embedder,
            config,
            parents: RwLock::new(ParentStore::default()),
        })
    }

    /// Replace the parent store, e.g. with one loaded from disk
    pub fn with_parents(self, parents: ParentStore) -> Self {
        Self {
            parents: RwLock::new(parents),
            ..self
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn parent_count(&self) -> Result<usize> {
        Ok(self.read_parents()?.len())
    }

    /// Snapshot of the parent store
    pub fn parents(&self) -> Result<ParentStore> {
        Ok(self.read_parents()?.clone())
    }

    fn read_parents(&self) -> Result<std::sync::RwLockReadGuard<'_, ParentStore>> {
        self.parents
            .read()
            .map_err(|e| Error::DocumentIndexer(format!("Lock error: {}", e)))
    }

    fn write_parents(&self) -> Result<std::sync::RwLockWriteGuard<'_, ParentStore>> {
        self.parents
            .write()
            .map_err(|e| Error::DocumentIndexer(format!("Lock error: {}", e)))
    }

    /// Split `text` into parent chunks and store them. Returns how many new
    /// parents were added.
    pub fn ingest_parents(&self, text: &str) -> Result<usize> {
        let splitter = SentenceSplitter::new(self.config.parent_tokens, self.config.parent_overlap)?;
        let chunks = splitter.split(text);

        let mut parents = self.write_parents()?;
        let added = chunks.iter().filter(|chunk| parents.insert(chunk)).count();

        debug!(chunks = chunks.len(), added, "ingested parent chunks");
        Ok(added)
    }

    /// Split every parent that has no children yet into child chunks, embed
    /// them and store them with a back-reference to their parent. Returns the
    /// number of children stored by this call.
    pub async fn ingest_children(&self) -> Result<usize> {
        let parents: Vec<ParentChunk> = {
            let store = self.read_parents()?;
            if store.is_empty() {
                return Err(Error::DocumentIndexer("Parent chunks were not created".to_string()));
            }
            store.pending()
        };

        let splitter = SentenceSplitter::new(self.config.child_tokens, self.config.child_overlap)?;
        let mut stored = 0;

        for parent in &parents {
            let children = splitter.split(&parent.text);
            if children.is_empty() {
                self.write_parents()?.mark_children_stored(&parent.id);
                continue;
            }

            let embeddings = self.embedder.embed_batch(&children).await?;
            if embeddings.len() != children.len() {
                return Err(Error::Embedding(format!(
                    "expected {} child embeddings, got {}",
                    children.len(),
                    embeddings.len()
                )));
            }

            let documents: Vec<VectorDocument> = children
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(i, (child, embedding))| VectorDocument {
                    id: content_id(&child),
                    content: child,
                    embedding: Some(embedding),
                    metadata: json!({
                        "parent_id": parent.id,
                        "chunk_index": i,
                    }),
                    score: None,
                })
                .collect();

            stored += self.vector_store.store_batch(documents).await?.len();
            self.write_parents()?.mark_children_stored(&parent.id);
        }

        debug!(parents = parents.len(), children = stored, "ingested child chunks");
        Ok(stored)
    }

    /// Find the parents of the children closest to `query`, best first
    pub async fn retrieve_parents(&self, query: &str, n_results: usize) -> Result<Vec<String>> {
        let query_embedding = self.embedder.embed(query).await?;
        let search = SearchConfig {
            top_k: n_results,
            score_threshold: None,
        };
        let hits = self.vector_store.search_by_vector(&query_embedding, &search).await?;

        let parents = self.read_parents()?;
        let mut seen = HashSet::new();
        let mut retrieved = Vec::new();

        for hit in &hits.documents {
            let Some(parent_id) = hit.metadata.get("parent_id").and_then(|v| v.as_str()) else {
                continue;
            };
            if !seen.insert(parent_id.to_string()) {
                continue;
            }
            match parents.get(parent_id) {
                Some(text) => retrieved.push(text.to_string()),
                None => warn!(parent_id, child_id = %hit.id, "child references an unknown parent"),
            }
        }

        Ok(retrieved)
    }

    /// Run parent ingestion, child ingestion and retrieval, timing each stage
    pub async fn debug_run(&self, text: &str, query: &str) -> Result<IngestReport> {
        let start = Instant::now();
        self.ingest_parents(text)?;
        let parent_secs = start.elapsed().as_secs_f64();
        let parent_count = self.parent_count()?;

        let start = Instant::now();
        self.ingest_children().await?;
        let child_secs = start.elapsed().as_secs_f64();
        let child_count = self.vector_store.count().await?;

        let start = Instant::now();
        let retrieved = self.retrieve_parents(query, self.config.n_results).await?;
        let context = format_context(&retrieved);
        let retrieval_secs = start.elapsed().as_secs_f64();

        info!(parent_count, child_count, retrieved = retrieved.len(), "parent-child run finished");

        Ok(IngestReport {
            config: self.config.clone(),
            parent_count,
            parent_secs,
            child_count,
            child_secs,
            query: query.to_string(),
            retrieved,
            context,
            retrieval_secs,
        })
    }
}

#[async_trait]
impl<V: VectorStore + 'static, E: EmbeddingProvider + 'static> DocumentIndexer for ParentChildIngester<V, E> {
    async fn index_document(&self, document: Document) -> Result<IndexingResult> {
        if !self.vector_store.is_connected() {
            return Err(Error::VectorStore("Vector store not connected".to_string()));
        }

        let added = self.ingest_parents(&document.content)?;
        if added == 0 && self.parent_count()? == 0 {
            return Ok(IndexingResult {
                documents_indexed: 0,
                documents_failed: 1,
                errors: vec![format!("Document {} produced no chunks", document.id)],
            });
        }

        let children = self.ingest_children().await?;
        Ok(IndexingResult {
            documents_indexed: children,
            documents_failed: 0,
            errors: Vec::new(),
        })
    }

    async fn index_from_file(&self, path: &str) -> Result<IndexingResult> {
        let content = tokio::fs::read_to_string(path).await?;

        let document = Document {
            id: Uuid::new_v4().to_string(),
            title: path.to_string(),
            content,
            source: Some(path.to_string()),
            metadata: json!({ "source": "file", "path": path }),
        };

        self.index_document(document).await
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        let children = self.vector_store.count().await?;
        Ok(json!({
            "parent_chunks": self.parent_count()?,
            "child_chunks": children,
            "parent_tokens": self.config.parent_tokens,
            "parent_overlap": self.config.parent_overlap,
            "child_tokens": self.config.child_tokens,
            "child_overlap": self.config.child_overlap,
            "embedding_model": self.embedder.embedding_model(),
        }))
    }
}

#[async_trait]
impl<V: VectorStore + 'static, E: EmbeddingProvider + 'static> Retriever for ParentChildIngester<V, E> {
    async fn retrieve(&self, query: &RAGQuery) -> Result<RAGResult> {
        let passages = self.retrieve_parents(&query.query, query.top_k).await?;
        let context = self.build_context(&passages);

        Ok(RAGResult {
            metadata: Some(json!({
                "query": query.query,
                "top_k": query.top_k,
                "parents_returned": passages.len(),
            })),
            passages,
            context,
        })
    }

    fn build_context(&self, passages: &[String]) -> String {
        format_context(passages)
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        DocumentIndexer::stats(self).await
    }
}
