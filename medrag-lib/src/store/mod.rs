//! Vector storage backends
//!
//! [`MemoryStore`] keeps everything in process and is used for demos and
//! tests. [`QdrantStore`] writes to a Qdrant collection over its REST API.
//!
//! # Storage Model
//!
//! Each stored item is an [`EmbeddingRecord`]:
//! - the embedded text
//! - its vector
//! - provenance and classification metadata (disease name, category, urgency)
//!
//! # Usage
//!
//! ```ignore
//! use medrag_lib::store::{MemoryStore, MetadataFilter, SearchMode, StoreQuery, VectorStore};
//!
//! let mut store = MemoryStore::new();
//!
//! // Replace the collection's content
//! store.add(&records, true)?;
//!
//! // Search by vector similarity
//! let filter = MetadataFilter::new().must_equal("is_emergency", true);
//! let hits = store.query(&StoreQuery {
//!     embedding: &query_embedding,
//!     text: "chest pain",
//!     top_k: 5,
//!     mode: SearchMode::Dense,
//!     filter: &filter,
//! })?;
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::embed::Embedding;
use crate::Result;

/// Provenance and classification tags attached to a stored record
pub type Metadata = BTreeMap<String, Value>;

/// A chunk's vector plus the metadata needed to trace it back to its source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    /// Stable identifier derived from the record's provenance and text
    pub id: u64,
    /// The embedded text
    pub text: String,
    pub vector: Embedding,
    pub metadata: Metadata,
}

/// A candidate passage returned by a similarity query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    pub text: String,
    /// Similarity score (higher is more similar)
    pub score: f32,
    pub metadata: Metadata,
}

/// How a store ranks candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vector similarity only
    Dense,
    /// Vector similarity combined with lexical signals, where the store supports it
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Dense => "dense",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dense" | "default" => Ok(SearchMode::Dense),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(crate::Error::InvalidParameter(format!(
                "unknown search mode '{other}', expected dense or hybrid"
            ))),
        }
    }
}

/// Exact-match conditions on record metadata, all of which must hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: Vec<(String, Value)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata[key] == value`.
    #[must_use]
    pub fn must_equal(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// One similarity query against a store
#[derive(Debug, Clone, Copy)]
pub struct StoreQuery<'a> {
    pub embedding: &'a [f32],
    /// Raw query text, for stores with lexical signals
    pub text: &'a str,
    pub top_k: usize,
    pub mode: SearchMode,
    pub filter: &'a MetadataFilter,
}

/// Trait for vector storage backends
pub trait VectorStore: Send + Sync {
    /// Name of the destination collection/table
    fn collection(&self) -> &str;

    /// Drop the collection and create it empty with the given vector
    /// dimension and cosine distance
    fn recreate(&mut self, dimension: usize) -> Result<()>;

    /// Write records
    ///
    /// With `overwrite`, all prior content of the collection is replaced:
    /// the collection is recreated with the dimension of the records before
    /// anything is written. Returns the number of records written.
    fn add(&mut self, records: &[EmbeddingRecord], overwrite: bool) -> Result<usize>;

    /// Top-k records by similarity, highest first
    fn query(&self, query: &StoreQuery<'_>) -> Result<Vec<RetrievalHit>>;

    /// Whether [`SearchMode::Hybrid`] means anything to this store
    fn supports_hybrid(&self) -> bool {
        false
    }

    /// Get total number of stored records
    fn count(&self) -> Result<usize>;
}

mod memory;
mod qdrant;

pub use memory::*;
pub use qdrant::*;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_filter_matches_all_conditions() {
        let mut metadata = Metadata::new();
        metadata.insert("category".into(), json!("A"));
        metadata.insert("is_emergency".into(), json!(true));

        assert!(MetadataFilter::new().matches(&metadata));
        assert!(MetadataFilter::new()
            .must_equal("category", "A")
            .must_equal("is_emergency", true)
            .matches(&metadata));
        assert!(!MetadataFilter::new()
            .must_equal("category", "A")
            .must_equal("is_emergency", false)
            .matches(&metadata));
        assert!(!MetadataFilter::new().must_equal("urgency_level", 3).matches(&metadata));
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!("dense".parse::<SearchMode>().unwrap(), SearchMode::Dense);
        assert_eq!("HYBRID".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!("sparse".parse::<SearchMode>().is_err());
    }
}
