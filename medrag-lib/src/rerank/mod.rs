//! Second-stage relevance scoring
//!
//! A cross-encoder service scores (query, passage) pairs jointly and returns
//! the passages it judges most relevant, best first.

use crate::Result;

/// Trait for rerank gateways
pub trait Reranker: Send + Sync {
    /// Rank `documents` against `query` and return at most `top_n` of their
    /// texts, most relevant first.
    ///
    /// Fewer than `top_n` results is not an error.
    fn rerank(&self, query: &str, documents: &[&str], top_n: usize) -> Result<Vec<String>>;
}

/// Pass-through reranker that keeps the input order
pub struct NoReranker;

impl Reranker for NoReranker {
    fn rerank(&self, _query: &str, documents: &[&str], top_n: usize) -> Result<Vec<String>> {
        Ok(documents.iter().take(top_n).map(|d| d.to_string()).collect())
    }
}

mod http;

pub use http::*;
