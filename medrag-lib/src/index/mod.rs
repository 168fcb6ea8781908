//! Full-rebuild indexing of diagnosis standards
//!
//! The relational store is an external collaborator: it hands over
//! [`DiagnosisStandard`] rows, [`select_for_index`] keeps the ones flagged
//! for immediate medical attention, and [`Indexer::rebuild`] chunks, embeds
//! and writes them to a vector store, replacing whatever was there.
//!
//! ```text
//! rows -> select_for_index -> Chunker -> Embedder -> VectorStore::add(overwrite)
//! ```
//!
//! A rebuild validates its input and embeds every chunk before it touches
//! the destination, so an empty feed or a gateway failure leaves the
//! previous index intact.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::chunk::{Chunker, WindowChunker};
use crate::embed::Embedder;
use crate::store::{EmbeddingRecord, Metadata, VectorStore};
use crate::{Error, Result};

/// A diagnosis standard row as stored in the relational database
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisStandard {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub describes: Option<String>,
    #[serde(default)]
    pub symptom: Option<String>,
    #[serde(default)]
    pub seek_medical_attention_immediately: Option<i64>,
    #[serde(default)]
    pub follow_up: Option<i64>,
    #[serde(default)]
    pub follow_up_describe: Option<String>,
    /// A/B classification code
    #[serde(default)]
    pub type_ab: Option<String>,
    #[serde(default)]
    pub is_emergency: Option<i64>,
    #[serde(default)]
    pub urgency_level: Option<i64>,
}

/// One row of the indexing feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRow {
    /// Disease name, kept as provenance and not embedded
    pub name: String,
    /// Text that gets chunked and embedded
    pub description: String,
    pub category: Option<String>,
    pub is_emergency: bool,
    pub urgency_level: Option<i64>,
}

/// Keep only rows flagged "seek medical attention immediately".
pub fn select_for_index(records: &[DiagnosisStandard]) -> Vec<SourceRow> {
    records
        .iter()
        .filter(|r| r.seek_medical_attention_immediately == Some(1))
        .map(|r| SourceRow {
            name: r.name.clone(),
            description: r.describes.clone().unwrap_or_default(),
            category: r.type_ab.clone(),
            is_emergency: r.is_emergency.is_some_and(|flag| flag != 0),
            urgency_level: r.urgency_level,
        })
        .collect()
}

/// Per-destination rebuild mutexes
///
/// Clones share the same table, so every indexer built from one
/// `RebuildLocks` serialises rebuilds of the same collection.
/// [`RebuildLocks::shared`] is the process-wide table used by
/// [`Indexer::new`].
#[derive(Debug, Clone, Default)]
pub struct RebuildLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RebuildLocks {
    /// A fresh table, independent of every other
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table
    pub fn shared() -> Self {
        static SHARED: OnceLock<RebuildLocks> = OnceLock::new();
        SHARED.get_or_init(RebuildLocks::new).clone()
    }

    fn lock_for(&self, collection: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(collection.to_string()).or_default().clone()
    }
}

/// Rebuilds a vector store from source rows
pub struct Indexer<C: Chunker = WindowChunker> {
    chunker: C,
    locks: RebuildLocks,
}

impl<C: Chunker> Indexer<C> {
    /// Indexer serialised against every other default-built indexer
    pub fn new(chunker: C) -> Self {
        Self::with_locks(chunker, RebuildLocks::shared())
    }

    /// Indexer using its own lock scope
    pub fn with_locks(chunker: C, locks: RebuildLocks) -> Self {
        Self { chunker, locks }
    }

    pub fn chunker(&self) -> &C {
        &self.chunker
    }

    /// Replace the content of `store` with the embedded `rows`.
    ///
    /// Rows with a blank description are skipped. Returns the number of
    /// records written (one per chunk). Fails with [`Error::EmptySource`]
    /// when no row has a description and with
    /// [`Error::Embedding`] when any chunk cannot be embedded; in both cases
    /// the store is left untouched.
    pub fn rebuild<E, S>(&self, embedder: &E, store: &mut S, rows: &[SourceRow]) -> Result<usize>
    where
        E: Embedder + ?Sized,
        S: VectorStore + ?Sized,
    {
        let usable: Vec<(usize, &SourceRow)> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let blank = row.description.trim().is_empty();
                if blank {
                    warn!(disease = %row.name, "skipping diagnosis standard without a description");
                }
                !blank
            })
            .collect();
        if usable.is_empty() {
            return Err(Error::EmptySource(format!(
                "refusing to rebuild '{}': none of {} rows has a description",
                store.collection(),
                rows.len()
            )));
        }

        let lock = self.locks.lock_for(store.collection());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        info!(collection = %store.collection(), rows = usable.len(), "rebuilding vector index");

        let pending = self.prepare(&usable);
        let texts: Vec<&str> = pending.iter().map(|p| p.text.as_str()).collect();
        debug!(chunks = texts.len(), chunker = self.chunker.name(), "embedding chunks");

        let vectors = embedder.embed_documents(&texts).map_err(|e| match e {
            Error::Embedding(msg) => Error::Embedding(msg),
            other => Error::Embedding(other.to_string()),
        })?;
        if vectors.len() != pending.len() {
            return Err(Error::Embedding(format!(
                "gateway returned {} embeddings for {} chunks",
                vectors.len(),
                pending.len()
            )));
        }
        let dimension = embedder.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(Error::Embedding(format!(
                "{} returned a {}-dimensional vector, expected {dimension}",
                embedder.model_name(),
                bad.len()
            )));
        }

        let records: Vec<EmbeddingRecord> = pending
            .into_iter()
            .zip(vectors)
            .map(|(p, vector)| EmbeddingRecord {
                id: p.id,
                text: p.text,
                vector,
                metadata: p.metadata,
            })
            .collect();

        let written = store.add(&records, true)?;
        info!(collection = %store.collection(), records = written, "vector index rebuilt");
        Ok(written)
    }

    fn prepare(&self, rows: &[(usize, &SourceRow)]) -> Vec<PendingRecord> {
        let mut pending = Vec::with_capacity(rows.len());
        for &(position, row) in rows {
            let chunks = self.chunker.chunk(&row.description);
            let chunk_count = chunks.len();
            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                let mut metadata = Metadata::new();
                metadata.insert("disease_name".into(), json!(row.name));
                if let Some(category) = &row.category {
                    metadata.insert("category".into(), json!(category));
                }
                metadata.insert("is_emergency".into(), json!(row.is_emergency));
                if let Some(level) = row.urgency_level {
                    metadata.insert("urgency_level".into(), json!(level));
                }
                metadata.insert("chunk_index".into(), json!(chunk_index));
                metadata.insert("chunk_count".into(), json!(chunk_count));

                pending.push(PendingRecord {
                    id: record_id(position, &row.name, chunk_index, &chunk.content),
                    text: chunk.content,
                    metadata,
                });
            }
        }
        pending
    }
}

struct PendingRecord {
    id: u64,
    text: String,
    metadata: Metadata,
}

/// Stable id from a record's provenance and text.
fn record_id(position: usize, name: &str, chunk_index: usize, text: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(position.to_le_bytes());
    hasher.update(name.as_bytes());
    hasher.update([0x1f]);
    hasher.update(chunk_index.to_le_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(id)
}
