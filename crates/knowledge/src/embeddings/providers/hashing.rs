//! Offline bag-of-words embedding provider.

use crate::embeddings::provider::{EmbeddingProvider, ProviderError};
use crate::types::EmbeddingVector;
use std::collections::{BTreeMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "where", "what", "when", "who", "why", "how", "did",
    "does", "do", "can", "you",
];

/// Weight of a whole-word hit relative to one character trigram.
const WORD_WEIGHT: f32 = 2.0;

/// Deterministic hashing embedder for development, offline use and tests.
///
/// Words are lowercased, split on non-alphanumeric characters, filtered
/// against a stop list, and hashed (whole word plus character trigrams)
/// into a fixed number of buckets. Texts sharing vocabulary land close
/// together under cosine similarity.
#[derive(Debug)]
pub struct HashingProvider {
    dimensions: usize,
    stop_words: HashSet<&'static str>,
}

impl HashingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn tokens(&self, text: &str) -> BTreeMap<String, u32> {
        let lower = text.to_lowercase();
        let mut freq = BTreeMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !self.stop_words.contains(w))
        {
            *freq.entry(word.to_string()).or_insert(0) += 1;
        }
        freq
    }

    fn bucket(&self, bytes: impl Iterator<Item = u8>, multiplier: u64) -> usize {
        let hash = bytes.fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> EmbeddingVector {
        let mut embedding = vec![0.0f32; self.dimensions];

        for (word, freq) in self.tokens(text) {
            let freq = freq as f32;
            embedding[self.bucket(word.bytes(), 31)] += WORD_WEIGHT * freq;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(trigram.bytes(), 37)] += freq.sqrt();
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        "hashing-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, ProviderError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::cosine_similarity;

    #[tokio::test]
    async fn test_hashing_provider_normalized() {
        let provider = HashingProvider::new(384);
        let embedding = provider.embed("hello world").await.unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_hashing_provider_deterministic() {
        let provider = HashingProvider::new(384);
        let a = provider.embed("deterministic test").await.unwrap();
        let b = provider.embed("deterministic test").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stop_words_only_is_zero_vector() {
        let provider = HashingProvider::new(64);
        let embedding = provider.embed("the and of it").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let provider = HashingProvider::new(384);
        let query = provider.embed("Where did the dog go?").await.unwrap();
        let cat = provider.embed("The cat sat.").await.unwrap();
        let dog = provider.embed("The dog ran fast.").await.unwrap();

        assert!(cosine_similarity(&query, &dog) > cosine_similarity(&query, &cat));
    }

    #[tokio::test]
    async fn test_utf8_text() {
        let provider = HashingProvider::new(384);
        let embedding = provider
            .embed("Gamedex é um aplicativo 🎮 brasileiro para gerenciar jogos!")
            .await
            .unwrap();

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
