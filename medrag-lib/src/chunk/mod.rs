//! Overlapping-window document chunking
//!
//! Text is first cut into units (words, sentences or paragraphs) by a rule
//! looked up in a [`UnitRules`] table, then a window of `chunk_size` units
//! slides over them, stepping back `overlap` units between windows.
//!
//! # Usage
//!
//! ```ignore
//! use medrag_lib::chunk::{Chunker, Granularity, WindowChunker};
//!
//! let chunker = WindowChunker::new(Granularity::Sentence, 5, 1)?;
//! for chunk in chunker.chunk(&description) {
//!     println!("[{}..{}) {}", chunk.unit_start, chunk.unit_end, chunk.content);
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::Result;

/// Unit a chunk window is measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Word,
    Sentence,
    Paragraph,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Word => "word",
            Granularity::Sentence => "sentence",
            Granularity::Paragraph => "paragraph",
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "word" | "words" => Ok(Granularity::Word),
            "sentence" | "sentences" => Ok(Granularity::Sentence),
            "paragraph" | "paragraphs" => Ok(Granularity::Paragraph),
            other => Err(crate::Error::InvalidParameter(format!(
                "unknown granularity '{other}', expected word, sentence or paragraph"
            ))),
        }
    }
}

/// A contiguous window of a source document
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TextChunk {
    /// The text of this window
    pub content: String,
    /// First unit covered (inclusive)
    pub unit_start: usize,
    /// One past the last unit covered
    pub unit_end: usize,
    /// Whether this window reaches the end of the document
    pub is_final: bool,
}

impl TextChunk {
    /// Number of units this chunk spans
    pub fn unit_len(&self) -> usize {
        self.unit_end - self.unit_start
    }
}

/// Trait for document chunking strategies
pub trait Chunker: Send + Sync {
    /// Split content into an ordered, non-empty sequence of chunks
    fn chunk(&self, content: &str) -> Vec<TextChunk>;

    /// Returns the name of this chunking strategy
    fn name(&self) -> &str;
}

/// Chunk `text` with the built-in English rules.
///
/// Fails with [`crate::Error::InvalidParameter`] unless `chunk_size > overlap`.
pub fn chunk_text(
    text: &str,
    granularity: Granularity,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>> {
    let chunker = WindowChunker::new(granularity, chunk_size, overlap)?;
    Ok(chunker.chunk(text))
}

mod units;
mod window;

pub use units::*;
pub use window::*;
