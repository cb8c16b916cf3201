//! Test doubles shared by the unit and scenario tests.

use crate::embeddings::{EmbeddingProvider, GatewayConfig, ProviderError};
use crate::types::EmbeddingVector;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// Gateway settings with millisecond backoffs.
pub(crate) fn fast_gateway_config() -> GatewayConfig {
    GatewayConfig {
        batch_size: 16,
        max_retries: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        max_concurrent_batches: 1,
    }
}

/// Deterministic provider with scriptable failures, latency, and a gate
/// that can hold calls until released.
#[derive(Debug)]
pub(crate) struct ScriptedProvider {
    dimensions: usize,
    returned_dimensions: usize,
    latency: Duration,
    transient_failures: AtomicUsize,
    always_transient: AtomicBool,
    always_permanent: bool,
    poison_text: Option<String>,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    gate: watch::Sender<bool>,
}

impl ScriptedProvider {
    pub(crate) fn new(dimensions: usize) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            dimensions,
            returned_dimensions: dimensions,
            latency: Duration::ZERO,
            transient_failures: AtomicUsize::new(0),
            always_transient: AtomicBool::new(false),
            always_permanent: false,
            poison_text: None,
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// First `n` calls fail with a transient error.
    pub(crate) fn fail_transient_times(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn fail_always_transient(self) -> Self {
        self.always_transient.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn fail_permanent(mut self) -> Self {
        self.always_permanent = true;
        self
    }

    /// Calls whose batch contains `text` fail permanently.
    pub(crate) fn fail_permanent_on_text(mut self, text: &str) -> Self {
        self.poison_text = Some(text.to_string());
        self
    }

    /// Return vectors of `dims` while still declaring the original dimension.
    pub(crate) fn with_returned_dimensions(mut self, dims: usize) -> Self {
        self.returned_dimensions = dims;
        self
    }

    /// Toggle transient failure of every call.
    pub(crate) fn set_fail_all(&self, fail: bool) {
        self.always_transient.store(fail, Ordering::SeqCst);
    }

    /// Hold every subsequent call until [`release`](Self::release).
    pub(crate) fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub(crate) fn release(&self) {
        self.gate.send_replace(true);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// The vector this provider returns for `text`.
    pub(crate) fn vector_for(text: &str, dims: usize) -> EmbeddingVector {
        // FNV-1a over the text, re-seeded per component
        (0..dims)
            .map(|component| {
                let mut hash: u64 = 0xcbf29ce484222325 ^ component as u64;
                for byte in text.bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(0x100000001b3);
                }
                (hash % 2001) as f32 / 1000.0 - 1.0
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, ProviderError> {
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(texts.len());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.always_permanent {
            return Err(ProviderError::permanent("scripted permanent failure"));
        }
        if let Some(poison) = &self.poison_text {
            if texts.iter().any(|t| t.contains(poison.as_str())) {
                return Err(ProviderError::permanent(format!("refusing '{}'", poison)));
            }
        }
        if self.always_transient.load(Ordering::SeqCst) {
            return Err(ProviderError::transient("scripted outage"));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::transient("scripted transient failure"));
        }

        Ok(texts
            .iter()
            .map(|t| Self::vector_for(t, self.returned_dimensions))
            .collect())
    }
}
