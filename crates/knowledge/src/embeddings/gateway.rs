//! Batching, retrying front for an [`EmbeddingProvider`].

use super::provider::{EmbeddingProvider, ProviderError};
use crate::error::{IndexError, IndexResult};
use crate::types::{EmbeddingModel, EmbeddingVector};
use docseek_core::EmbeddingSettings;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Gateway tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Maximum texts per provider call
    pub batch_size: usize,

    /// Retries after the first failed attempt of a batch
    pub max_retries: u32,

    pub initial_backoff: Duration,
    pub max_backoff: Duration,

    /// Batches allowed in flight at once
    pub max_concurrent_batches: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&EmbeddingSettings::default())
    }
}

impl From<&EmbeddingSettings> for GatewayConfig {
    fn from(settings: &EmbeddingSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            max_concurrent_batches: settings.max_concurrent_batches.max(1),
        }
    }
}

/// Stateless adapter between the pipeline and the embedding provider.
///
/// A failure of any batch fails the whole call; callers never see a
/// partial result.
#[derive(Debug, Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    config: GatewayConfig,
}

impl EmbeddingGateway {
    /// Batch size and concurrency are clamped to at least one.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, mut config: GatewayConfig) -> Self {
        config.batch_size = config.batch_size.max(1);
        config.max_concurrent_batches = config.max_concurrent_batches.max(1);
        Self { provider, config }
    }

    /// Provider, model and dimensions of the vectors this gateway produces.
    pub fn model(&self) -> EmbeddingModel {
        EmbeddingModel {
            provider: self.provider.provider_name().to_string(),
            model: self.provider.model_name().to_string(),
            dimensions: self.provider.dimensions(),
        }
    }

    /// Declared dimensions of the provider's vectors.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed `texts`, preserving length and order.
    #[instrument(skip(self, texts), fields(texts = texts.len(), provider = self.provider.provider_name()))]
    pub async fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<Vec<String>> = texts
            .chunks(self.config.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        debug!(
            "Embedding {} texts in {} batch(es) of up to {}",
            texts.len(),
            batches.len(),
            self.config.batch_size
        );

        let per_batch: Vec<Vec<EmbeddingVector>> = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| async move { self.embed_with_retries(index, &batch).await })
            .buffered(self.config.max_concurrent_batches)
            .try_collect()
            .await?;

        Ok(per_batch.into_iter().flatten().collect())
    }

    /// Embed a single text (used for queries).
    pub async fn embed_one(&self, text: &str) -> IndexResult<EmbeddingVector> {
        let mut vectors = self.embed_with_retries(0, &[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| IndexError::EmbeddingUnavailable {
            attempts: 1,
            reason: "provider returned no vector".to_string(),
        })
    }

    async fn embed_with_retries(
        &self,
        batch_index: usize,
        batch: &[String],
    ) -> IndexResult<Vec<EmbeddingVector>> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.provider.embed_batch(batch).await {
                Ok(vectors) if vectors.len() == batch.len() => return Ok(vectors),
                Ok(vectors) => {
                    return Err(IndexError::EmbeddingUnavailable {
                        attempts: attempt,
                        reason: format!(
                            "provider returned {} vectors for {} texts",
                            vectors.len(),
                            batch.len()
                        ),
                    })
                }
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        "Embedding batch {} failed (attempt {}/{}): {}; retrying in {}ms",
                        batch_index,
                        attempt,
                        self.config.max_retries + 1,
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(unavailable(attempt, e)),
            }
        }
    }

    /// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`,
    /// capped at `max_backoff`.
    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(20);
        self.config
            .initial_backoff
            .saturating_mul(factor)
            .min(self.config.max_backoff)
    }
}

fn unavailable(attempts: u32, err: ProviderError) -> IndexError {
    IndexError::EmbeddingUnavailable {
        attempts,
        reason: err.to_string(),
    }
}
