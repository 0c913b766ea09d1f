//! Qdrant-backed vector store

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    GetPointsBuilder, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use lmpipe_core::{
    VectorStore, VectorDocument, SearchResult, SearchConfig,
    Error, Result,
};

/// Qdrant vector store using cosine distance
pub struct QdrantVectorStore {
    url: String,
    collection: String,
    dimension: u64,
    client: Option<Qdrant>,
}

impl QdrantVectorStore {
    pub fn new(url: impl Into<String>, collection: impl Into<String>, dimension: u64) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
            dimension,
            client: None,
        }
    }

    fn client(&self) -> Result<&Qdrant> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::VectorStore("Not connected. Call connect() first.".to_string()))
    }

    /// Qdrant only accepts UUIDs or integers as point ids; derive a UUID
    /// from the first 128 bits of the SHA-256 of our id.
    fn point_id(id: &str) -> PointId {
        let digest = Sha256::digest(id.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        PointId::from(Uuid::from_bytes(bytes).to_string())
    }

    fn payload(document: &VectorDocument) -> Result<Payload> {
        Payload::try_from(json!({
            "doc_id": document.id,
            "content": document.content,
            "metadata": document.metadata,
        }))
        .map_err(|e| Error::VectorStore(format!("Invalid payload: {}", e)))
    }

    fn document_from_payload(mut payload: HashMap<String, QdrantValue>, score: Option<f32>) -> Option<VectorDocument> {
        let id = payload.remove("doc_id")?.into_json();
        let content = payload.remove("content")?.into_json();
        let metadata = payload
            .remove("metadata")
            .map(QdrantValue::into_json)
            .unwrap_or(serde_json::Value::Null);

        Some(VectorDocument {
            id: id.as_str()?.to_string(),
            content: content.as_str()?.to_string(),
            embedding: None,
            metadata,
            score,
        })
    }

    async fn ensure_collection(&self) -> Result<()> {
        let client = self.client()?;
        let exists = client
            .collection_exists(self.collection.as_str())
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        if !exists {
            client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine)),
                )
                .await
                .map_err(|e| Error::VectorStore(e.to_string()))?;
            info!(collection = %self.collection, dimension = self.dimension, "created qdrant collection");
        }

        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn connect(&mut self) -> Result<()> {
        let client = Qdrant::from_url(&self.url)
            .build()
            .map_err(|e| Error::VectorStore(format!("Failed to connect to {}: {}", self.url, e)))?;
        self.client = Some(client);
        self.ensure_collection().await
    }

    async fn store(&self, document: VectorDocument) -> Result<String> {
        let mut ids = self.store_batch(vec![document]).await?;
        ids.pop()
            .ok_or_else(|| Error::VectorStore("Nothing was stored".to_string()))
    }

    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(documents.len());
        let mut points = Vec::with_capacity(documents.len());

        for document in documents {
            let embedding = document.embedding.clone().ok_or_else(|| {
                Error::VectorStore(format!("Document {} has no embedding", document.id))
            })?;
            points.push(PointStruct::new(
                Self::point_id(&document.id),
                embedding,
                Self::payload(&document)?,
            ));
            ids.push(document.id);
        }

        self.client()?
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(ids)
    }

    async fn search_by_vector(&self, vector: &[f32], config: &SearchConfig) -> Result<SearchResult> {
        let mut request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), config.top_k as u64)
            .with_payload(true);
        if let Some(threshold) = config.score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = self
            .client()?
            .search_points(request)
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        let documents: Vec<VectorDocument> = response
            .result
            .into_iter()
            .filter_map(|point| Self::document_from_payload(point.payload, Some(point.score)))
            .collect();

        let total = documents.len();
        Ok(SearchResult { documents, total })
    }

    async fn get(&self, id: &str) -> Result<Option<VectorDocument>> {
        let response = self
            .client()?
            .get_points(GetPointsBuilder::new(&self.collection, vec![Self::point_id(id)]).with_payload(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .next()
            .and_then(|point| Self::document_from_payload(point.payload, None)))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if self.get(id).await?.is_none() {
            return Ok(false);
        }

        self.client()?
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids: vec![Self::point_id(id)] })
                    .wait(true),
            )
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        self.client()?
            .delete_collection(self.collection.as_str())
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;
        self.ensure_collection().await
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client()?
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = QdrantVectorStore::point_id("abc");
        let b = QdrantVectorStore::point_id("abc");
        let c = QdrantVectorStore::point_id("abd");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_unconnected_store_reports_error() {
        let store = QdrantVectorStore::new("http://localhost:6334", "children", 384);
        assert!(!store.is_connected());
        assert!(matches!(store.client(), Err(Error::VectorStore(_))));
    }
}
