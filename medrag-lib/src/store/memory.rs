use std::collections::{BTreeMap, HashSet};

use crate::embed::tokens;
use crate::store::{EmbeddingRecord, RetrievalHit, SearchMode, StoreQuery, VectorStore};
use crate::{Error, Result};

/// Share of the hybrid score taken by vector similarity
const DENSE_WEIGHT: f32 = 0.7;

/// In-memory vector store for development and testing.
///
/// Uses brute-force cosine similarity search. Suitable for small datasets
/// (< 10k records). Hybrid queries blend in the fraction of query terms
/// found in the record text.
pub struct MemoryStore {
    collection: String,
    dimension: Option<usize>,
    records: BTreeMap<u64, EmbeddingRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Create an empty store reporting `collection` as its name.
    #[must_use]
    pub fn named(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            dimension: None,
            records: BTreeMap::new(),
        }
    }

    /// Vector dimension of the current collection, if one was set
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Stored records in id order
    pub fn records(&self) -> impl Iterator<Item = &EmbeddingRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore for MemoryStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn recreate(&mut self, dimension: usize) -> Result<()> {
        self.records.clear();
        self.dimension = Some(dimension);
        Ok(())
    }

    fn add(&mut self, records: &[EmbeddingRecord], overwrite: bool) -> Result<usize> {
        if overwrite {
            let dimension = records
                .first()
                .map(|r| r.vector.len())
                .or(self.dimension)
                .unwrap_or(0);
            self.recreate(dimension)?;
        }

        let dimension = match (self.dimension, records.first()) {
            (Some(d), _) => d,
            (None, Some(first)) => first.vector.len(),
            (None, None) => return Ok(0),
        };
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(Error::Store(format!(
                "record {} has dimension {}, collection '{}' expects {dimension}",
                bad.id,
                bad.vector.len(),
                self.collection
            )));
        }

        self.dimension = Some(dimension);
        for record in records {
            self.records.insert(record.id, record.clone());
        }
        Ok(records.len())
    }

    fn query(&self, query: &StoreQuery<'_>) -> Result<Vec<RetrievalHit>> {
        if let Some(dimension) = self.dimension {
            if !self.records.is_empty() && query.embedding.len() != dimension {
                return Err(Error::Store(format!(
                    "query has dimension {}, collection '{}' expects {dimension}",
                    query.embedding.len(),
                    self.collection
                )));
            }
        }

        let query_terms: HashSet<String> = match query.mode {
            SearchMode::Hybrid => tokens(query.text).into_iter().collect(),
            SearchMode::Dense => HashSet::new(),
        };

        let mut scored: Vec<(f32, &EmbeddingRecord)> = self
            .records
            .values()
            .filter(|r| query.filter.matches(&r.metadata))
            .map(|r| {
                let dense = cosine_similarity(query.embedding, &r.vector);
                let score = match query.mode {
                    SearchMode::Dense => dense,
                    SearchMode::Hybrid => {
                        DENSE_WEIGHT * dense
                            + (1.0 - DENSE_WEIGHT) * term_overlap(&query_terms, &r.text)
                    }
                };
                (score, r)
            })
            .collect();

        // descending score, id order breaks ties
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

        Ok(scored
            .into_iter()
            .take(query.top_k)
            .map(|(score, r)| RetrievalHit {
                text: r.text.clone(),
                score,
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    fn supports_hybrid(&self) -> bool {
        true
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}

/// Fraction of query terms present in `text`.
fn term_overlap(query_terms: &HashSet<String>, text: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let doc_terms: HashSet<String> = tokens(text).into_iter().collect();
    let shared = query_terms.intersection(&doc_terms).count();
    shared as f32 / query_terms.len() as f32
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
