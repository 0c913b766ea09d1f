//! Text splitting, vector stores and parent-child retrieval for lmpipe
//!
//! Documents are split on sentence boundaries into token-bounded chunks. The
//! parent-child ingester embeds small child chunks for precise matching and
//! answers queries with the larger parent chunks they came from.

mod splitter;
mod semantic;
mod vector_store;
mod parent_child;
#[cfg(feature = "qdrant")]
mod qdrant;


pub use splitter::{SentenceSplitter, sentence_aware_split, split_sentences, count_tokens};
pub use semantic::{semantic_split, percentile};
pub use vector_store::{LocalVectorStore, cosine_similarity};
pub use parent_child::{ParentChildIngester, ParentStore, ParentChunk, IngestConfig, IngestReport, content_id};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;

// Re-export core types for convenience
pub use lmpipe_core::{
    Retriever, RAGQuery, RAGResult,
    VectorStore, VectorDocument, SearchResult, SearchConfig,
    DocumentIndexer, Document, IndexingResult,
    EmbeddingProvider, Error, Result,
};
