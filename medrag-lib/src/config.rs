//! Configuration for the gateways, stores and retrieval pipeline
//!
//! Every component takes its section of [`Config`] in its constructor; there
//! is no process-wide state. All fields have defaults so a partial JSON file
//! (or none at all) is enough to get started.
//!
//! ```json
//! {
//!   "embedding": { "api_base": "http://10.0.0.5:12001/v1" },
//!   "retrieval": { "top_k": 8, "mode": "dense" },
//!   "chunking": { "granularity": "sentence", "chunk_size": 5, "overlap": 1 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::Granularity;
use crate::search::RerankFallback;
use crate::store::SearchMode;
use crate::{Error, Result};

/// Top-level configuration object
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub rerank: RerankConfig,
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
    pub qdrant: QdrantConfig,
}

impl Config {
    /// Load a JSON configuration file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("embedding.model", &self.embedding.model)?;
        require_url("embedding.api_base", &self.embedding.api_base)?;
        require_non_empty("rerank.model", &self.rerank.model)?;
        require_url("rerank.api_base", &self.rerank.api_base)?;
        require_url("qdrant.url", &self.qdrant.url)?;
        require_non_empty("qdrant.collection", &self.qdrant.collection)?;

        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be at least 1".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be at least 1".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.top_n == 0 {
            return Err(Error::Config("retrieval.top_n must be at least 1".into()));
        }
        if self.chunking.chunk_size <= self.chunking.overlap {
            return Err(Error::Config(format!(
                "chunking.chunk_size ({}) must be greater than chunking.overlap ({})",
                self.chunking.chunk_size, self.chunking.overlap
            )));
        }
        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<()> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(Error::Config(format!("{field} must be an http(s) URL, got '{value}'")));
    }
    Ok(())
}

/// OpenAI-compatible embedding endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Base URL; `/embeddings` is appended
    pub api_base: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Maximum inputs per request
    pub batch_size: usize,
    /// Vector dimension the model produces
    pub dimension: usize,
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "bge-embedding".to_string(),
            api_base: "http://localhost:12001/v1".to_string(),
            api_key: None,
            timeout_secs: 600,
            batch_size: 32,
            dimension: 1024,
        }
    }
}

/// Cross-encoder rerank endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankConfig {
    pub model: String,
    /// Base URL; `/rerank` is appended
    pub api_base: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl RerankConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            model: "bge-reranker".to_string(),
            api_base: "http://localhost:12002/v1".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Query-time defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched from the vector index
    pub top_k: usize,
    /// Passages kept by the reranker
    pub top_n: usize,
    pub mode: SearchMode,
    /// Hits scoring below this are dropped before reranking
    pub min_score: Option<f32>,
    pub on_rerank_failure: RerankFallback,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            top_n: 3,
            mode: SearchMode::Hybrid,
            min_score: None,
            on_rerank_failure: RerankFallback::Fail,
        }
    }
}

/// Chunking applied to source descriptions during indexing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub granularity: Granularity,
    pub chunk_size: usize,
    pub overlap: usize,
    /// Sentence splitting locale ("en", "ch"; anything else behaves like "en")
    pub locale: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Word,
            chunk_size: 500,
            overlap: 50,
            locale: "en".to_string(),
        }
    }
}

/// Qdrant REST endpoint and destination collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl QdrantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "diagnosis_standards".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}
