//! Builds index snapshots from document sets.

use crate::chunker::{self, ChunkConfig};
use crate::embeddings::EmbeddingGateway;
use crate::error::{IndexError, IndexResult};
use crate::snapshot::{source_digest, IndexSnapshot};
use crate::types::{Chunk, Document};
use crate::vector_index::VectorIndex;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Chunks, embeds, and indexes a document set into a fresh snapshot.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    gateway: EmbeddingGateway,
}

impl IndexBuilder {
    pub fn new(gateway: EmbeddingGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    /// Build a snapshot from `documents`.
    ///
    /// Chunk order follows document order, then ordinal. Returns
    /// `InvalidConfig` for bad chunk parameters before any work is done;
    /// every later failure (embedding, dimensions) is `BuildAborted`.
    #[instrument(skip_all, fields(documents = documents.len(), max_length = config.max_length))]
    pub async fn build(
        &self,
        documents: &[Document],
        config: &ChunkConfig,
    ) -> IndexResult<IndexSnapshot> {
        config.validate()?;
        let start = Instant::now();

        let mut chunks: Vec<Chunk> = Vec::new();
        for document in documents {
            let before = chunks.len();
            chunks.extend(chunker::chunk(document, config)?);
            debug!(
                "Chunked {} into {} chunk(s)",
                document.source_name,
                chunks.len() - before
            );
        }
        info!(
            "Chunked {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .gateway
            .embed_batch(&texts)
            .await
            .map_err(IndexError::aborted_by)?;

        let expected = self.gateway.dimensions();
        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != expected)
        {
            return Err(IndexError::aborted(format!(
                "dimension mismatch at chunk {}: provider declares {}, returned {}",
                position,
                expected,
                vector.len()
            )));
        }

        let index = VectorIndex::build(vectors, chunks)?;
        info!(
            "Built index of {} vectors ({} dims) in {}ms",
            index.len(),
            index.dimensions(),
            start.elapsed().as_millis()
        );

        Ok(IndexSnapshot::new(
            index,
            source_digest(documents),
            *config,
            self.gateway.model(),
            documents.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tests::support::{fast_gateway_config, ScriptedProvider};
    use std::sync::Arc;

    fn builder(provider: &Arc<ScriptedProvider>) -> IndexBuilder {
        IndexBuilder::new(EmbeddingGateway::new(provider.clone(), fast_gateway_config()))
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::from_text("first.txt", "a".repeat(25)),
            Document::from_text("second.txt", "b".repeat(8)),
        ]
    }

    #[tokio::test]
    async fn test_build_keeps_document_then_ordinal_order() {
        let config = ChunkConfig::new(10, 2).unwrap();
        let snapshot = builder(&Arc::new(ScriptedProvider::new(4)))
            .build(&docs(), &config)
            .await
            .unwrap();

        // 25 chars with step 8 -> starts 0, 8, 16; "b" doc -> 1 chunk
        let order: Vec<(String, u32)> = snapshot
            .chunk_records()
            .iter()
            .map(|c| (c.source_name().unwrap_or_default().to_string(), c.ordinal))
            .collect();
        assert_eq!(
            order,
            vec![
                ("first.txt".to_string(), 0),
                ("first.txt".to_string(), 1),
                ("first.txt".to_string(), 2),
                ("second.txt".to_string(), 0),
            ]
        );
        assert_eq!(snapshot.document_count, 2);
        assert_eq!(snapshot.dimensions(), 4);
        assert_eq!(snapshot.source_digest, source_digest(&docs()));
    }

    #[tokio::test]
    async fn test_invalid_chunk_config_fails_before_embedding() {
        let provider = Arc::new(ScriptedProvider::new(4));
        let bad = ChunkConfig {
            max_length: 10,
            overlap_length: 10,
        };

        let err = builder(&provider).build(&docs(), &bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_build() {
        let provider = Arc::new(ScriptedProvider::new(4).fail_always_transient());
        let err = builder(&provider)
            .build(&docs(), &ChunkConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BuildAborted);
        assert_eq!(err.root_kind(), ErrorKind::EmbeddingUnavailable);
    }

    #[tokio::test]
    async fn test_wrong_dimension_aborts_build() {
        let provider = Arc::new(ScriptedProvider::new(4).with_returned_dimensions(3));
        let err = builder(&provider)
            .build(&docs(), &ChunkConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BuildAborted);
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn test_empty_documents_build_empty_snapshot() {
        let docs = vec![Document::from_text("blank.txt", "   \n\t ")];
        let snapshot = builder(&Arc::new(ScriptedProvider::new(4)))
            .build(&docs, &ChunkConfig::default())
            .await
            .unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.document_count, 1);
    }
}
