use crate::chunk::{Chunker, Granularity, TextChunk, UnitRule, UnitRules};
use crate::config::ChunkingConfig;
use crate::{Error, Result};

/// Sliding-window chunker over words, sentences or paragraphs
///
/// Windows hold `chunk_size` units and consecutive windows share `overlap`
/// units. When the next full step would run past the end, the remaining
/// units become one final chunk instead of a short trailing sliver.
///
/// Text with no more than `chunk_size` units is returned verbatim as a
/// single chunk.
#[derive(Debug, Clone)]
pub struct WindowChunker {
    granularity: Granularity,
    chunk_size: usize,
    overlap: usize,
    locale: String,
    rule: UnitRule,
}

impl WindowChunker {
    /// Chunker using the built-in rules and the "en" locale.
    pub fn new(granularity: Granularity, chunk_size: usize, overlap: usize) -> Result<Self> {
        Self::with_rules(&UnitRules::builtin(), granularity, "en", chunk_size, overlap)
    }

    /// Chunker resolving its split rule from `rules` for `locale`.
    pub fn with_rules(
        rules: &UnitRules,
        granularity: Granularity,
        locale: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Self> {
        if chunk_size <= overlap {
            return Err(Error::InvalidParameter(format!(
                "chunk_size ({chunk_size}) must be greater than overlap ({overlap})"
            )));
        }
        Ok(Self {
            granularity,
            chunk_size,
            overlap,
            locale: locale.to_string(),
            rule: rules.resolve(granularity, locale),
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::with_rules(
            &UnitRules::builtin(),
            config.granularity,
            &config.locale,
            config.chunk_size,
            config.overlap,
        )
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    fn window(&self, units: &[&str], start: usize, end: usize) -> TextChunk {
        let mut content = units[start..end].join(self.rule.separator);
        if end < units.len() {
            content.push_str(self.rule.terminator);
        }
        TextChunk {
            content,
            unit_start: start,
            unit_end: end,
            is_final: end == units.len(),
        }
    }
}

impl Chunker for WindowChunker {
    fn name(&self) -> &str {
        self.granularity.as_str()
    }

    fn chunk(&self, content: &str) -> Vec<TextChunk> {
        let units = (self.rule.split)(content);
        let count = units.len();

        // short documents pass through untouched
        if count <= self.chunk_size {
            return vec![TextChunk {
                content: content.to_string(),
                unit_start: 0,
                unit_end: count,
                is_final: true,
            }];
        }

        let stride = self.chunk_size - self.overlap;
        let mut chunks = Vec::with_capacity(count.div_ceil(stride) + 1);
        let mut start = 0;
        while start < count {
            let end = (start + self.chunk_size).min(count);
            chunks.push(self.window(&units, start, end));
            if end == count {
                break;
            }

            start = end - self.overlap;
            // one more step would overshoot: take the remainder now
            if start + stride >= count {
                chunks.push(self.window(&units, start, count));
                break;
            }
        }
        chunks
    }
}
