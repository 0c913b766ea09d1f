//! Core traits and types for lmpipe
//!
//! This crate defines the fundamental traits and types shared by the lmpipe
//! crates: language-model and embedding providers, vector stores, document
//! indexers and retrievers. Keeping them here lets every pipeline be tested
//! against scripted providers instead of a live model server.

pub mod llm;
pub mod rag;
pub mod vector_store;
pub mod document_indexer;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use llm::{LLMProvider, EmbeddingProvider, GenerationConfig, GenerationResult};
pub use rag::{Retriever, RAGQuery, RAGResult};
pub use vector_store::{VectorStore, VectorDocument, SearchResult, SearchConfig};
pub use document_indexer::{DocumentIndexer, Document, IndexingResult};
pub use types::*;
