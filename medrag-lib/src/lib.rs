//! medrag - retrieval pipeline for a medical diagnosis knowledge base
//!
//! # Architecture
//!
//! ```text
//! Diagnosis rows -> Chunker -> Embedder -> VectorStore      (Indexer::rebuild)
//!                                              |
//! Query -> Embedder -> Retriever <-------------+
//!                          |
//!                      Reranker -> fuse -> Passages         (SearchEngine)
//! ```
//!
//! Embedding and rerank models run behind HTTP gateways; the vector index is
//! either in process ([`store::MemoryStore`]) or a Qdrant collection.
//!
//! # Example
//!
//! ```ignore
//! use medrag_lib::{
//!     chunk::WindowChunker, embed::OpenAiEmbedder, index::Indexer, rerank::HttpReranker,
//!     search::SearchEngine, store::QdrantStore, Config,
//! };
//!
//! let config = Config::from_file("medrag.json")?;
//! let embedder = OpenAiEmbedder::new(&config.embedding)?;
//! let mut store = QdrantStore::new(&config.qdrant)?;
//!
//! // Rebuild the index
//! let indexer = Indexer::new(WindowChunker::from_config(&config.chunking)?);
//! indexer.rebuild(&embedder, &mut store, &rows)?;
//!
//! // Search
//! let engine = SearchEngine::with_rerank(embedder, store, HttpReranker::new(&config.rerank)?);
//! let passages = engine.search_reranked("sudden chest pain", 5, 3, config.retrieval.mode)?;
//! ```

pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod index;
pub mod rerank;
pub mod search;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};
