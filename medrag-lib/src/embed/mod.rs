//! Text embedding gateways
//!
//! Embedding models run out of process; [`OpenAiEmbedder`] talks to any
//! OpenAI-compatible `/embeddings` endpoint. [`HashEmbedder`] is a
//! deterministic offline stand-in for dry runs and tests.
//!
//! # Usage
//!
//! ```ignore
//! use medrag_lib::embed::{Embedder, OpenAiEmbedder};
//!
//! let embedder = OpenAiEmbedder::new(&config.embedding)?;
//!
//! // Embed documents (for indexing)
//! let doc_embeddings = embedder.embed_documents(&["Acute appendicitis...", "Stroke..."])?;
//!
//! // Embed query (for searching)
//! let query_embedding = embedder.embed_query("sudden chest pain")?;
//! ```

use crate::Result;

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding gateways
pub trait Embedder: Send + Sync {
    /// Embed multiple documents for indexing
    ///
    /// Returns exactly one embedding per input, in input order.
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single query for searching
    fn embed_query(&self, text: &str) -> Result<Embedding>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

mod hash;
mod openai;

pub use hash::*;
pub(crate) use hash::tokens;
pub use openai::*;
