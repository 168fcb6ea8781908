//! Query-time pipeline
//!
//! [`Retriever`] turns a query into candidate passages; [`SearchEngine`]
//! adds the second stage: the candidates go to a [`Reranker`] and the
//! [`fuse`] filter keeps those the reranker returned.
//!
//! # Usage
//!
//! ```ignore
//! use medrag_lib::search::SearchEngine;
//! use medrag_lib::store::SearchMode;
//!
//! // Retrieval only
//! let engine = SearchEngine::new(embedder, store);
//! let hits = engine.search("sudden chest pain", 5, SearchMode::Dense)?;
//!
//! // Retrieve 5, keep what the reranker puts in its top 3
//! let engine = SearchEngine::with_rerank(embedder, store, reranker);
//! let hits = engine.search_reranked("sudden chest pain", 5, 3, SearchMode::Hybrid)?;
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embed::Embedder;
use crate::rerank::{NoReranker, Reranker};
use crate::store::{MetadataFilter, RetrievalHit, SearchMode, StoreQuery, VectorStore};
use crate::{Error, Result};

mod fusion;

pub use fusion::fuse;

/// What to do when the rerank gateway is unavailable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankFallback {
    /// Surface [`Error::RerankUnavailable`]
    #[default]
    Fail,
    /// Log a warning and return the first `top_n` retrieval hits
    Unranked,
}

/// First-stage retrieval over a vector store.
pub struct Retriever<E: Embedder, S: VectorStore> {
    embedder: E,
    store: S,
    min_score: Option<f32>,
}

impl<E: Embedder, S: VectorStore> Retriever<E, S> {
    #[must_use]
    pub fn new(embedder: E, store: S) -> Self {
        Self {
            embedder,
            store,
            min_score: None,
        }
    }

    /// Drop hits scoring below `min_score`.
    #[must_use]
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Top `top_k` passages for `query`, most similar first.
    ///
    /// Zero hits is a successful empty result. A failing store is reported
    /// as [`Error::EmptyResult`], a failing embedding gateway as
    /// [`Error::Embedding`].
    pub fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<Vec<RetrievalHit>> {
        self.search_filtered(query, top_k, mode, &MetadataFilter::new())
    }

    /// Like [`search`](Self::search), restricted to records matching `filter`.
    pub fn search_filtered(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievalHit>> {
        if top_k == 0 {
            return Err(Error::InvalidParameter("top_k must be at least 1".into()));
        }

        let embedding = self.embedder.embed_query(query).map_err(|e| match e {
            Error::Embedding(msg) => Error::Embedding(msg),
            other => Error::Embedding(other.to_string()),
        })?;

        let mode = if mode == SearchMode::Hybrid && !self.store.supports_hybrid() {
            warn!(
                collection = %self.store.collection(),
                "store has no lexical index, using dense search"
            );
            SearchMode::Dense
        } else {
            mode
        };

        let mut hits = self
            .store
            .query(&StoreQuery {
                embedding: &embedding,
                text: query,
                top_k,
                mode,
                filter,
            })
            .map_err(|e| {
                Error::EmptyResult(format!(
                    "search on '{}' failed: {e}",
                    self.store.collection()
                ))
            })?;

        if let Some(min_score) = self.min_score {
            hits.retain(|hit| hit.score >= min_score);
        }
        hits.truncate(top_k);
        debug!(collection = %self.store.collection(), %mode, top_k, hits = hits.len(), "retrieved");
        Ok(hits)
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Retrieval plus optional rerank filtering.
pub struct SearchEngine<E: Embedder, S: VectorStore, R: Reranker = NoReranker> {
    retriever: Retriever<E, S>,
    reranker: Option<R>,
    fallback: RerankFallback,
}

// Constructor for engines without reranking
impl<E: Embedder, S: VectorStore> SearchEngine<E, S, NoReranker> {
    /// Create a new search engine without reranking.
    #[must_use]
    pub fn new(embedder: E, store: S) -> Self {
        Self {
            retriever: Retriever::new(embedder, store),
            reranker: None,
            fallback: RerankFallback::default(),
        }
    }
}

// Constructor for engines with reranking
impl<E: Embedder, S: VectorStore, R: Reranker> SearchEngine<E, S, R> {
    /// Create a new search engine with reranking enabled.
    #[must_use]
    pub fn with_rerank(embedder: E, store: S, reranker: R) -> Self {
        Self {
            retriever: Retriever::new(embedder, store),
            reranker: Some(reranker),
            fallback: RerankFallback::default(),
        }
    }
}

// Common methods available on all engines
impl<E: Embedder, S: VectorStore, R: Reranker> SearchEngine<E, S, R> {
    #[must_use]
    pub fn with_fallback(mut self, fallback: RerankFallback) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.retriever = self.retriever.with_min_score(min_score);
        self
    }

    /// Single-stage search using vector similarity only.
    pub fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<Vec<RetrievalHit>> {
        self.retriever.search(query, top_k, mode)
    }

    /// Retrieve `top_k` candidates, rerank them, and keep those in the
    /// reranker's top `top_n`.
    ///
    /// The kept hits stay in retrieval order. Without a reranker the first
    /// `top_n` candidates are returned.
    pub fn search_reranked(
        &self,
        query: &str,
        top_k: usize,
        top_n: usize,
        mode: SearchMode,
    ) -> Result<Vec<RetrievalHit>> {
        self.search_reranked_filtered(query, top_k, top_n, mode, &MetadataFilter::new())
    }

    pub fn search_reranked_filtered(
        &self,
        query: &str,
        top_k: usize,
        top_n: usize,
        mode: SearchMode,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievalHit>> {
        if top_n == 0 {
            return Err(Error::InvalidParameter("top_n must be at least 1".into()));
        }

        let mut hits = self.retriever.search_filtered(query, top_k, mode, filter)?;

        let Some(reranker) = &self.reranker else {
            hits.truncate(top_n);
            return Ok(hits);
        };
        if hits.is_empty() {
            return Ok(hits);
        }

        let documents: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        match reranker.rerank(query, &documents, top_n) {
            Ok(ranked) => {
                let fused = fuse(hits, &ranked);
                debug!(ranked = ranked.len(), kept = fused.len(), "fused rerank results");
                Ok(fused)
            }
            Err(Error::RerankUnavailable(reason)) if self.fallback == RerankFallback::Unranked => {
                warn!(%reason, "rerank unavailable, returning unranked hits");
                hits.truncate(top_n);
                Ok(hits)
            }
            Err(e) => Err(e),
        }
    }

    pub fn retriever(&self) -> &Retriever<E, S> {
        &self.retriever
    }

    /// Returns a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        self.retriever.store()
    }

    /// Returns a mutable reference to the store.
    pub fn store_mut(&mut self) -> &mut S {
        self.retriever.store_mut()
    }
}
