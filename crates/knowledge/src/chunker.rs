//! Text chunking with configurable size and overlap.
//!
//! Text is normalized (whitespace runs collapsed to single spaces) and then
//! cut into windows of `max_length` characters, each starting
//! `max_length - overlap_length` characters after the previous one.

use crate::error::{IndexError, IndexResult};
use crate::types::{Chunk, Document, Metadata, MetadataValue};
use docseek_core::ChunkSettings;
use serde::{Deserialize, Serialize};

/// Chunk window parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub max_length: usize,
    pub overlap_length: usize,
}

impl ChunkConfig {
    pub fn new(max_length: usize, overlap_length: usize) -> IndexResult<Self> {
        let config = Self {
            max_length,
            overlap_length,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.overlap_length >= self.max_length {
            return Err(IndexError::InvalidConfig(format!(
                "overlap_length ({}) must be smaller than max_length ({})",
                self.overlap_length, self.max_length
            )));
        }
        Ok(())
    }

    /// Distance between consecutive chunk starts.
    pub fn step(&self) -> usize {
        self.max_length - self.overlap_length
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::from(&ChunkSettings::default())
    }
}

impl From<&ChunkSettings> for ChunkConfig {
    fn from(settings: &ChunkSettings) -> Self {
        Self {
            max_length: settings.max_length,
            overlap_length: settings.overlap_length,
        }
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a document into chunks.
///
/// Fails with `InvalidConfig` before touching the text. Empty or
/// whitespace-only documents yield an empty sequence.
pub fn chunk<'a>(document: &'a Document, config: &ChunkConfig) -> IndexResult<Chunks<'a>> {
    config.validate()?;

    let text = normalize_text(&document.raw_text);
    if text.is_empty() {
        tracing::info!("Skipping empty document '{}'", document.source_name);
    }

    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());

    Ok(Chunks {
        document,
        config: *config,
        text,
        boundaries,
        offset: 0,
        ordinal: 0,
        done: false,
    })
}

/// Lazy chunk sequence for one document.
///
/// Cloning yields an independent cursor; [`Chunks::restart`] rewinds this one.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    document: &'a Document,
    config: ChunkConfig,
    text: String,
    /// Byte offset of every char, plus `text.len()` at the end
    boundaries: Vec<usize>,
    offset: usize,
    ordinal: u32,
    done: bool,
}

impl<'a> Chunks<'a> {
    /// Normalized document length in characters.
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn restart(&mut self) {
        self.offset = 0;
        self.ordinal = 0;
        self.done = false;
    }

    fn remaining(&self) -> usize {
        if self.done {
            return 0;
        }
        let len = self.char_len();
        if self.offset >= len {
            return 0;
        }
        let rest = len - self.offset;
        if rest <= self.config.max_length {
            1
        } else {
            1 + (rest - self.config.max_length).div_ceil(self.config.step())
        }
    }

    fn make_chunk(&self, start: usize, end: usize) -> Chunk {
        let text = &self.text[self.boundaries[start]..self.boundaries[end]];

        let mut metadata: Metadata = self.document.metadata.clone();
        metadata.insert(
            "source".to_string(),
            MetadataValue::Text(self.document.source_name.clone()),
        );
        metadata.insert("char_start".to_string(), start.into());
        metadata.insert("char_end".to_string(), end.into());

        Chunk {
            id: Chunk::id_for(&self.document.id, self.ordinal),
            document_id: self.document.id.clone(),
            ordinal: self.ordinal,
            text: text.to_string(),
            metadata,
        }
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let len = self.char_len();
        if self.done || self.offset >= len {
            self.done = true;
            return None;
        }

        let start = self.offset;
        let end = (start + self.config.max_length).min(len);
        let chunk = self.make_chunk(start, end);

        if end == len {
            self.done = true;
        } else {
            self.offset += self.config.step();
        }
        self.ordinal += 1;

        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::from_text("test-source", text)
    }

    #[test]
    fn test_short_document_yields_one_normalized_chunk() {
        let d = doc("  The   cat\n\tsat.  ");
        let chunks: Vec<Chunk> = chunk(&d, &ChunkConfig::new(20, 5).unwrap())
            .unwrap()
            .collect();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The cat sat.");
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[0].id, Chunk::id_for(&d.id, 0));
    }

    #[test]
    fn test_no_overlap_exact_tiling() {
        let d = doc(&"a".repeat(300));
        let chunks: Vec<Chunk> = chunk(&d, &ChunkConfig::new(100, 0).unwrap())
            .unwrap()
            .collect();

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.len() == 100));
    }

    #[test]
    fn test_overlap_windows_and_truncated_tail() {
        let d = doc("abcdefghijklmnopqrstuvwxyz");
        let chunks: Vec<String> = chunk(&d, &ChunkConfig::new(10, 3).unwrap())
            .unwrap()
            .map(|c| c.text)
            .collect();

        assert_eq!(chunks, vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]);
    }

    #[test]
    fn test_chunks_cover_text_without_gaps() {
        let text = "lorem ipsum dolor sit amet ".repeat(40);
        let d = doc(&text);
        let config = ChunkConfig::new(64, 16).unwrap();
        let chunks: Vec<Chunk> = chunk(&d, &config).unwrap().collect();

        let mut covered = 0usize;
        for c in &chunks {
            let start = c.metadata["char_start"].as_f64().unwrap() as usize;
            let end = c.metadata["char_end"].as_f64().unwrap() as usize;
            assert!(start <= covered, "gap before chunk {}", c.ordinal);
            assert!(end - start <= config.max_length);
            covered = end;
        }
        assert_eq!(covered, normalize_text(&text).chars().count());
    }

    #[test]
    fn test_overlap_not_smaller_than_max_is_invalid() {
        let d = doc("anything");
        let config = ChunkConfig {
            max_length: 10,
            overlap_length: 10,
        };
        let err = chunk(&d, &config).unwrap_err();
        assert!(matches!(err, IndexError::InvalidConfig(_)));
        assert!(ChunkConfig::new(5, 9).is_err());
    }

    #[test]
    fn test_empty_and_whitespace_documents_yield_nothing() {
        let config = ChunkConfig::new(50, 10).unwrap();
        assert_eq!(chunk(&doc(""), &config).unwrap().count(), 0);
        assert_eq!(chunk(&doc(" \n\t "), &config).unwrap().count(), 0);
    }

    #[test]
    fn test_exact_size_and_restart() {
        let d = doc(&"xyz ".repeat(100));
        let mut chunks = chunk(&d, &ChunkConfig::new(30, 10).unwrap()).unwrap();
        let expected = chunks.len();
        let first: Vec<Chunk> = chunks.by_ref().collect();
        assert_eq!(first.len(), expected);
        assert_eq!(chunks.len(), 0);

        chunks.restart();
        let second: Vec<Chunk> = chunks.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_utf8_chunking_counts_chars() {
        let d = doc("Gamedex é um aplicativo 🎮 com acentuação: ã, õ, ç.");
        let chunks: Vec<Chunk> = chunk(&d, &ChunkConfig::new(10, 2).unwrap())
            .unwrap()
            .collect();

        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 10);
        }
    }

    #[test]
    fn test_chunk_metadata_inherits_document() {
        let mut meta = Metadata::new();
        meta.insert("sheet".to_string(), "Lotes".into());
        let d = Document::new("planilha.xlsx", "row one", meta);

        let c = chunk(&d, &ChunkConfig::default()).unwrap().next().unwrap();
        assert_eq!(c.metadata["sheet"].as_str(), Some("Lotes"));
        assert_eq!(c.source_name(), Some("planilha.xlsx"));
    }
}
