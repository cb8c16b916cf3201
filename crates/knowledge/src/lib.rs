//! Document retrieval index.
//!
//! Documents are chunked, embedded, and indexed into immutable snapshots.
//! Queries run against the current snapshot while rebuilds happen in the
//! background and swap in atomically.

pub mod builder;
pub mod chunker;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod lifecycle;
pub mod persist;
pub mod query;
pub mod snapshot;
pub mod sources;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use builder::IndexBuilder;
pub use chunker::{chunk, ChunkConfig, Chunks};
pub use context::{ContextBuilder, ContextPassage, ContextPayload};
pub use embeddings::{create_provider, EmbeddingGateway, EmbeddingProvider, GatewayConfig};
pub use error::{ErrorKind, IndexError, IndexResult};
pub use lifecycle::{IndexManager, IndexStatus, LifecycleState, ManagerConfig, RebuildOutcome};
pub use query::QueryEngine;
pub use snapshot::IndexSnapshot;
pub use sources::{DirectorySource, DocumentSource, StaticSource};
pub use types::{Chunk, Document, EmbeddingModel, Metadata, MetadataValue, RetrievalResult, ScoredChunk};
pub use vector_index::VectorIndex;

use docseek_core::{AppConfig, IndexSettings};
use std::path::PathBuf;

/// Index manager and query engine wired from application configuration.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    manager: IndexManager,
    engine: QueryEngine,
    settings: IndexSettings,
    workspace: PathBuf,
}

impl KnowledgeBase {
    pub fn open(config: &AppConfig) -> IndexResult<Self> {
        let settings = config.index.clone();

        let provider = create_provider(&settings.embedding)?;
        let gateway = EmbeddingGateway::new(provider, GatewayConfig::from(&settings.embedding));
        let manager = IndexManager::new(
            IndexBuilder::new(gateway),
            ManagerConfig {
                chunk: ChunkConfig::from(&settings.chunk),
                snapshot_path: settings.persist_snapshot.then(|| config.snapshot_path()),
            },
        )?;

        let mut engine = QueryEngine::new(manager.clone())?;
        if let Some(template) = &settings.query.prompt_template {
            engine = engine.with_context_builder(ContextBuilder::with_template(template)?);
        }

        tracing::debug!(
            "Opened knowledge base in {:?} with provider {}",
            config.workspace,
            settings.embedding.provider
        );

        Ok(Self {
            manager,
            engine,
            settings,
            workspace: config.workspace.clone(),
        })
    }

    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    /// Directory source over `paths`, falling back to the configured
    /// `source_paths`. Relative paths resolve against the workspace.
    pub fn directory_source(&self, paths: &[PathBuf]) -> IndexResult<DirectorySource> {
        let paths = if paths.is_empty() {
            &self.settings.source_paths
        } else {
            paths
        };
        if paths.is_empty() {
            return Err(IndexError::Source(
                "no document paths given and none configured in source_paths".to_string(),
            ));
        }

        let roots = paths
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    self.workspace.join(p)
                }
            })
            .collect();
        Ok(DirectorySource::new(roots, self.settings.source_extensions.clone()))
    }

    /// Install the persisted snapshot, if any.
    pub async fn restore(&self) -> IndexResult<bool> {
        self.manager.restore().await
    }

    /// Rebuild from `source` and wait for the outcome.
    pub async fn reindex<S>(&self, source: S, force: bool) -> IndexResult<IndexStatus>
    where
        S: DocumentSource + 'static,
    {
        if force {
            self.manager.trigger_forced_reindex(source)?;
        } else {
            self.manager.trigger_reindex(source)?;
        }
        Ok(self.manager.wait_for_rebuild().await)
    }

    /// Top-k retrieval; `k` defaults to `query.default_top_k`.
    pub async fn ask(&self, query: &str, k: Option<usize>) -> IndexResult<RetrievalResult> {
        self.engine
            .answer_query(query, k.unwrap_or(self.settings.query.default_top_k))
            .await
    }

    /// Retrieval plus an assembled prompt payload.
    pub async fn context(&self, query: &str, k: Option<usize>) -> IndexResult<ContextPayload> {
        self.engine
            .retrieve_context(query, k.unwrap_or(self.settings.query.default_top_k))
            .await
    }

    pub fn status(&self) -> IndexStatus {
        self.manager.status()
    }
}
