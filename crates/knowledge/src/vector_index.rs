//! Immutable k-nearest-neighbor index over chunk vectors.
//!
//! Vectors are L2-normalized at build time and stored row-major in one
//! contiguous buffer; search is an exact scan scoring every row by dot
//! product (cosine similarity of the normalized vectors).

use crate::error::{IndexError, IndexResult};
use crate::types::{Chunk, EmbeddingVector, ScoredChunk};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimensions: usize,
    /// `chunks.len() * dimensions` normalized components
    vectors: Vec<f32>,
    chunks: Vec<Arc<Chunk>>,
}

impl VectorIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bulk-build from parallel vectors and chunk records.
    ///
    /// `vectors[i]` belongs to `chunks[i]`. Every vector must have the same,
    /// non-zero dimension and only finite components.
    pub fn build(vectors: Vec<EmbeddingVector>, chunks: Vec<Chunk>) -> IndexResult<Self> {
        if vectors.len() != chunks.len() {
            return Err(IndexError::aborted(format!(
                "{} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let Some(dimensions) = vectors.first().map(Vec::len) else {
            return Ok(Self::empty());
        };
        if dimensions == 0 {
            return Err(IndexError::aborted("embedding vectors have zero dimensions"));
        }

        let mut flat = Vec::with_capacity(vectors.len() * dimensions);
        for (position, mut vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(IndexError::aborted(format!(
                    "dimension mismatch at chunk {}: expected {}, found {}",
                    position,
                    dimensions,
                    vector.len()
                )));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(IndexError::aborted(format!(
                    "non-finite component in vector for chunk {}",
                    position
                )));
            }
            l2_normalize(&mut vector);
            flat.extend_from_slice(&vector);
        }

        Ok(Self {
            dimensions,
            vectors: flat,
            chunks: chunks.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimension, 0 when empty.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    /// Normalized vectors in chunk order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        // max(1) keeps chunks_exact valid for the empty index
        self.vectors.chunks_exact(self.dimensions.max(1))
    }

    /// Reject `k` values that can never produce a result.
    pub fn validate_k(k: usize) -> IndexResult<()> {
        if k == 0 {
            return Err(IndexError::InvalidArgument(
                "k must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Exact top-k by cosine similarity, highest first, ties broken by
    /// ascending chunk id. Returns `min(k, len)` hits.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<ScoredChunk>> {
        Self::validate_k(k)?;

        if self.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.dimensions {
            return Err(IndexError::InvalidArgument(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors()
            .map(|row| dot(&query, row))
            .enumerate()
            .collect();

        let by_rank = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1)
                .then_with(|| self.chunks[a.0].id.cmp(&self.chunks[b.0].id))
        };

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_by(by_rank);

        tracing::debug!("Scanned {} vectors, returning top {}", self.len(), k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                chunk: Arc::clone(&self.chunks[position]),
                score,
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `v` to unit length; zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            ordinal: 0,
            text: format!("text of {}", id),
            metadata: Metadata::new(),
        }
    }

    fn index(rows: &[(&str, Vec<f32>)]) -> VectorIndex {
        let (ids, vectors): (Vec<&str>, Vec<Vec<f32>>) = rows.iter().cloned().unzip();
        VectorIndex::build(vectors, ids.into_iter().map(chunk).collect()).unwrap()
    }

    fn ids(hits: &[ScoredChunk]) -> Vec<&str> {
        hits.iter().map(|h| h.chunk.id.as_str()).collect()
    }

    /// Small deterministic generator for test vectors.
    fn lcg_vectors(count: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                (0..dims)
                    .map(|_| {
                        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                        ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_scores_are_ordered_descending() {
        let idx = index(&[
            ("chunk4", vec![-1.0, 0.0, 0.0]),
            ("chunk2", vec![0.7, 0.7, 0.0]),
            ("chunk1", vec![1.0, 0.0, 0.0]),
            ("chunk3", vec![0.0, 1.0, 0.0]),
        ]);

        let hits = idx.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(ids(&hits), vec!["chunk1", "chunk2", "chunk3", "chunk4"]);
        assert!(hits[0].score > 0.99);
        assert!((hits[3].score + 1.0).abs() < 1e-6, "opposite vector scores -1");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_k_bounds_result_length() {
        let idx = index(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
            ("c", vec![1.0, 1.0]),
        ]);

        assert_eq!(idx.search(&[1.0, 0.2], 2).unwrap().len(), 2);
        assert_eq!(idx.search(&[1.0, 0.2], 3).unwrap().len(), 3);
        assert_eq!(idx.search(&[1.0, 0.2], 50).unwrap().len(), 3);
    }

    #[test]
    fn test_zero_k_is_invalid_argument() {
        let idx = index(&[("a", vec![1.0, 0.0])]);
        let err = idx.search(&[1.0, 0.0], 0).unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));

        // Also rejected on an empty index
        assert!(VectorIndex::empty().search(&[1.0], 0).is_err());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let idx = VectorIndex::build(Vec::new(), Vec::new()).unwrap();
        assert!(idx.is_empty());
        assert!(idx.search(&[0.3, 0.4], 5).unwrap().is_empty());
        assert_eq!(idx.vectors().count(), 0);
    }

    #[test]
    fn test_ties_broken_by_ascending_id() {
        let idx = index(&[
            ("doc/000003", vec![0.0, 2.0]),
            ("doc/000001", vec![0.0, 1.0]),
            ("doc/000002", vec![0.0, 5.0]),
            ("doc/000000", vec![1.0, 0.0]),
        ]);

        let hits = idx.search(&[0.0, 1.0], 2).unwrap();
        assert_eq!(ids(&hits), vec!["doc/000001", "doc/000002"]);
    }

    #[test]
    fn test_magnitude_does_not_affect_rank() {
        let idx = index(&[("big", vec![100.0, 1.0]), ("small", vec![0.01, 0.02])]);
        let hits = idx.search(&[0.0, 3.0], 1).unwrap();
        assert_eq!(ids(&hits), vec!["small"]);
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let err = VectorIndex::build(
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
            vec![chunk("a"), chunk("b")],
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::BuildAborted { .. }));
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn test_build_rejects_length_mismatch_and_nan() {
        assert!(VectorIndex::build(vec![vec![1.0]], vec![]).is_err());
        assert!(VectorIndex::build(vec![vec![f32::NAN, 1.0]], vec![chunk("a")]).is_err());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let idx = index(&[("a", vec![1.0, 0.0])]);
        let err = idx.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
    }

    #[test]
    fn test_matches_brute_force_reference() {
        let dims = 16;
        let vectors = lcg_vectors(200, dims, 42);
        let chunks: Vec<Chunk> = (0..200).map(|i| chunk(&format!("c{:04}", i))).collect();
        let idx = VectorIndex::build(vectors.clone(), chunks).unwrap();

        for (q, query) in lcg_vectors(10, dims, 7).iter().enumerate() {
            let mut reference: Vec<(String, f32)> = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("c{:04}", i), cosine_similarity(query, v)))
                .collect();
            reference.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            let hits = idx.search(query, 10).unwrap();
            let got: Vec<&str> = ids(&hits);
            let want: Vec<&str> = reference.iter().take(10).map(|(id, _)| id.as_str()).collect();
            assert_eq!(got, want, "query {} diverged from exact scan", q);
            for (hit, (_, score)) in hits.iter().zip(&reference) {
                assert!((hit.score - score).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
