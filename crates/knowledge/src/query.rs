//! Query path: embed the question and search the current snapshot.

use crate::context::{ContextBuilder, ContextPayload};
use crate::embeddings::EmbeddingGateway;
use crate::error::{IndexError, IndexResult};
use crate::lifecycle::IndexManager;
use crate::types::RetrievalResult;
use crate::vector_index::VectorIndex;
use tracing::{debug, instrument};

/// Answers top-k queries against whatever snapshot is current.
///
/// Each query pins one snapshot for its whole duration, so a concurrent
/// rebuild never mixes two generations into one result.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    manager: IndexManager,
    gateway: EmbeddingGateway,
    context: ContextBuilder,
}

impl QueryEngine {
    /// Engine using the manager's own embedding gateway.
    pub fn new(manager: IndexManager) -> IndexResult<Self> {
        let gateway = manager.gateway().clone();
        Self::with_gateway(manager, gateway)
    }

    /// Engine with a separate gateway for query embeddings. It must use the
    /// same provider and model the index was built with.
    pub fn with_gateway(manager: IndexManager, gateway: EmbeddingGateway) -> IndexResult<Self> {
        Ok(Self {
            manager,
            gateway,
            context: ContextBuilder::new()?,
        })
    }

    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    /// Top-k chunks for `query_text`, highest similarity first.
    ///
    /// `EmptyIndex` if nothing (or only an empty snapshot) is installed.
    /// Invalid arguments and embedding or search failures come back wrapped
    /// in `QueryFailed`.
    #[instrument(skip(self, query_text))]
    pub async fn answer_query(&self, query_text: &str, k: usize) -> IndexResult<RetrievalResult> {
        let snapshot = self
            .manager
            .current()
            .filter(|s| !s.is_empty())
            .ok_or(IndexError::EmptyIndex)?;

        VectorIndex::validate_k(k).map_err(IndexError::query_failed)?;
        if query_text.trim().is_empty() {
            return Err(IndexError::query_failed(IndexError::InvalidArgument(
                "query text is empty".to_string(),
            )));
        }

        let vector = self
            .gateway
            .embed_one(query_text)
            .await
            .map_err(IndexError::query_failed)?;

        let result = snapshot.search(&vector, k).map_err(IndexError::query_failed)?;
        debug!(
            "Query answered from generation {} with {} hit(s)",
            result.generation,
            result.len()
        );
        Ok(result)
    }

    /// Retrieve and assemble a grounded prompt payload.
    pub async fn retrieve_context(&self, query_text: &str, k: usize) -> IndexResult<ContextPayload> {
        let result = self.answer_query(query_text, k).await?;
        self.context.assemble(query_text, &result)
    }
}
