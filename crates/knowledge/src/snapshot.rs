//! Immutable, versioned index snapshots.

use crate::chunker::ChunkConfig;
use crate::error::IndexResult;
use crate::types::{Chunk, Document, EmbeddingModel, RetrievalResult};
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A complete index built from one document set.
///
/// Never mutated after construction; a rebuild produces a new snapshot that
/// replaces this one wholesale.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    /// Assigned on install, strictly increasing per manager
    pub generation: u64,
    pub built_at: DateTime<Utc>,

    /// Digest of the document set this snapshot was built from
    pub source_digest: String,
    pub chunk_config: ChunkConfig,

    /// Model that embedded the chunks; queries must use the same one
    pub model: EmbeddingModel,
    pub document_count: usize,
    index: VectorIndex,
}

impl IndexSnapshot {
    pub fn new(
        index: VectorIndex,
        source_digest: String,
        chunk_config: ChunkConfig,
        model: EmbeddingModel,
        document_count: usize,
    ) -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            source_digest,
            chunk_config,
            model,
            document_count,
            index,
        }
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub(crate) fn with_built_at(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = built_at;
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn chunk_records(&self) -> &[Arc<Chunk>] {
        self.index.chunks()
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether a rebuild from `digest` with `config` and `model` would
    /// produce the same chunks and vectors.
    pub fn matches(&self, digest: &str, config: &ChunkConfig, model: &EmbeddingModel) -> bool {
        self.source_digest == digest && self.chunk_config == *config && self.model == *model
    }

    /// Top-k search tagged with this snapshot's generation.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<RetrievalResult> {
        let hits = self.index.search(query, k)?;
        Ok(RetrievalResult {
            generation: self.generation,
            hits,
        })
    }
}

/// Order-sensitive digest of a document set.
///
/// Two sets with the same documents in the same order (by source name and
/// content hash) share a digest.
pub fn source_digest(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.source_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.content_hash.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, dimensions: usize) -> EmbeddingModel {
        EmbeddingModel {
            provider: "scripted".to_string(),
            model: name.to_string(),
            dimensions,
        }
    }

    #[test]
    fn test_digest_tracks_content_and_order() {
        let a = Document::from_text("a.txt", "alpha");
        let b = Document::from_text("b.txt", "beta");

        let base = source_digest(&[a.clone(), b.clone()]);
        assert_eq!(base, source_digest(&[a.clone(), b.clone()]));
        assert_ne!(base, source_digest(&[b.clone(), a.clone()]));
        assert_ne!(base, source_digest(&[a.clone(), Document::from_text("b.txt", "beta!")]));
        assert_ne!(base, source_digest(&[a]));
    }

    #[test]
    fn test_digest_separates_name_from_hash() {
        // Same concatenated bytes, different boundaries
        let x = Document::from_text("ab", "same");
        let mut y = x.clone();
        y.source_name = "a".to_string();
        y.content_hash = format!("b{}", x.content_hash);
        assert_ne!(source_digest(&[x]), source_digest(&[y]));
    }

    #[test]
    fn test_search_reports_generation() {
        let chunk = Chunk {
            id: "d/000000".to_string(),
            document_id: "d".to_string(),
            ordinal: 0,
            text: "hello".to_string(),
            metadata: Default::default(),
        };
        let index = VectorIndex::build(vec![vec![1.0, 0.0]], vec![chunk]).unwrap();
        let snapshot =
            IndexSnapshot::new(index, "digest".into(), ChunkConfig::default(), model("m", 2), 1)
                .with_generation(7);

        let result = snapshot.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(result.generation, 7);
        assert_eq!(result.len(), 1);
        assert_eq!(snapshot.chunk_count(), 1);
        assert_eq!(snapshot.dimensions(), 2);
    }

    #[test]
    fn test_matches_requires_same_model() {
        let config = ChunkConfig::default();
        let snapshot =
            IndexSnapshot::new(VectorIndex::empty(), "digest".into(), config, model("a", 8), 0);

        assert!(snapshot.matches("digest", &config, &model("a", 8)));
        assert!(!snapshot.matches("other", &config, &model("a", 8)));
        assert!(!snapshot.matches("digest", &ChunkConfig::new(64, 0).unwrap(), &model("a", 8)));
        assert!(!snapshot.matches("digest", &config, &model("b", 8)));
        assert!(!snapshot.matches("digest", &config, &model("a", 16)));
    }
}
