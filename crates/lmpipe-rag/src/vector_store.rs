//! In-memory vector store with optional JSON persistence

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use lmpipe_core::{
    VectorStore, VectorDocument, SearchResult, SearchConfig,
    Error, Result,
};

/// Cosine similarity of two vectors; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Local in-memory vector store implementation
pub struct LocalVectorStore {
    documents: Arc<RwLock<HashMap<String, VectorDocument>>>,
    snapshot_path: Option<PathBuf>,
    connected: bool,
}

impl LocalVectorStore {
    /// Create a new, non-persistent local vector store
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            snapshot_path: None,
            connected: false,
        }
    }

    /// Open a store backed by a JSON snapshot file.
    ///
    /// The snapshot is loaded if it exists; otherwise the store starts empty
    /// and the file is created on the first `persist`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut documents = HashMap::new();

        if tokio::fs::try_exists(&path).await? {
            let raw = tokio::fs::read_to_string(&path).await?;
            let stored: Vec<VectorDocument> = serde_json::from_str(&raw)
                .map_err(|e| Error::VectorStore(format!("Corrupt snapshot {}: {}", path.display(), e)))?;
            for doc in stored {
                documents.insert(doc.id.clone(), doc);
            }
            info!(path = %path.display(), documents = documents.len(), "loaded vector store snapshot");
        }

        Ok(Self {
            documents: Arc::new(RwLock::new(documents)),
            snapshot_path: Some(path),
            connected: false,
        })
    }

    /// Write the store to its snapshot file, if it has one
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let json = {
            let docs = self.documents.read()
                .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
            let mut stored: Vec<&VectorDocument> = docs.values().collect();
            stored.sort_by(|a, b| a.id.cmp(&b.id));
            serde_json::to_string(&stored)?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, json).await?;
        debug!(path = %path.display(), "persisted vector store snapshot");
        Ok(())
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn rank(mut results: Vec<VectorDocument>, config: &SearchConfig) -> SearchResult {
        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(config.top_k);

        let total = results.len();
        SearchResult {
            documents: results,
            total,
        }
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn store(&self, document: VectorDocument) -> Result<String> {
        let id = document.id.clone();
        let mut docs = self.documents.write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        docs.insert(id.clone(), document);
        Ok(id)
    }

    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut docs = self.documents.write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        for document in documents {
            let id = document.id.clone();
            docs.insert(id.clone(), document);
            ids.push(id);
        }

        Ok(ids)
    }

    async fn search_by_vector(&self, vector: &[f32], config: &SearchConfig) -> Result<SearchResult> {
        let docs = self.documents.read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let results: Vec<VectorDocument> = docs
            .values()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let score = cosine_similarity(vector, embedding);
                let mut doc_with_score = doc.clone();
                doc_with_score.score = Some(score);
                Some(doc_with_score)
            })
            .filter(|doc| match config.score_threshold {
                Some(threshold) => doc.score.unwrap_or(0.0) >= threshold,
                None => true,
            })
            .collect();

        Ok(Self::rank(results, config))
    }

    async fn get(&self, id: &str) -> Result<Option<VectorDocument>> {
        let docs = self.documents.read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut docs = self.documents.write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.remove(id).is_some())
    }

    async fn clear(&self) -> Result<()> {
        let mut docs = self.documents.write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        docs.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let docs = self.documents.read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.len())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, embedding: Vec<f32>) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            content: format!("content of {}", id),
            embedding: Some(embedding),
            metadata: json!({ "parent_id": "p" }),
            score: None,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_local_vector_store() {
        let mut store = LocalVectorStore::new();
        store.connect().await.unwrap();
        assert!(store.is_connected());

        let id = store.store(doc("child1", vec![1.0, 0.0])).await.unwrap();
        assert_eq!(id, "child1");
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("child1").await.unwrap().is_some());

        // same id replaces instead of duplicating
        store.store(doc("child1", vec![0.0, 1.0])).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        assert!(store.delete("child1").await.unwrap());
        assert!(!store.delete("child1").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let mut store = LocalVectorStore::new();
        store.connect().await.unwrap();
        store
            .store_batch(vec![
                doc("far", vec![0.0, 1.0]),
                doc("near", vec![1.0, 0.1]),
                doc("middle", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let config = SearchConfig { top_k: 2, score_threshold: None };
        let results = store.search_by_vector(&[1.0, 0.0], &config).await.unwrap();

        let ids: Vec<&str> = results.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "middle"]);
        assert_eq!(results.total, 2);
    }

    #[tokio::test]
    async fn test_search_applies_threshold_and_skips_unembedded() {
        let store = LocalVectorStore::new();
        store.store(doc("near", vec![1.0, 0.0])).await.unwrap();
        store.store(doc("far", vec![0.0, 1.0])).await.unwrap();
        store
            .store(VectorDocument {
                id: "bare".to_string(),
                content: "no embedding".to_string(),
                embedding: None,
                metadata: json!({}),
                score: None,
            })
            .await
            .unwrap();

        let config = SearchConfig { top_k: 10, score_threshold: Some(0.5) };
        let results = store.search_by_vector(&[1.0, 0.0], &config).await.unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.documents[0].id, "near");
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("children.json");

        let store = LocalVectorStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.store(doc("a", vec![1.0, 0.0])).await.unwrap();
        store.store(doc("b", vec![0.0, 1.0])).await.unwrap();
        store.persist().await.unwrap();

        let reopened = LocalVectorStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        let a = reopened.get("a").await.unwrap().unwrap();
        assert_eq!(a.embedding, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("children.json");
        std::fs::write(&path, "{ not a list").unwrap();

        let result = LocalVectorStore::open(&path).await;
        assert!(matches!(result, Err(Error::VectorStore(_))));
    }
}
