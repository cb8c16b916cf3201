//! Index lifecycle: the current snapshot, background rebuilds, and status.
//!
//! Readers take an `Arc` of the current snapshot under a read lock and keep
//! using it for the whole query; a rebuild builds off to the side and swaps
//! the pointer under a brief write lock. At most one rebuild runs at a time.

use crate::builder::IndexBuilder;
use crate::chunker::ChunkConfig;
use crate::embeddings::EmbeddingGateway;
use crate::error::{IndexError, IndexResult};
use crate::persist;
use crate::snapshot::{source_digest, IndexSnapshot};
use crate::sources::DocumentSource;
use crate::types::EmbeddingModel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No snapshot has ever been installed
    Empty,
    Ready,
    Rebuilding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildOutcome {
    /// A new snapshot replaced the previous one
    Installed,
    /// Documents and chunking matched the current snapshot; nothing rebuilt
    Unchanged,
    Failed,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub state: LifecycleState,
    /// Build time of the snapshot currently served
    pub last_build_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_outcome: Option<RebuildOutcome>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_build_duration_ms: Option<u64>,
    pub generation: Option<u64>,
    pub document_count: usize,
    pub chunk_count: usize,
    pub source_digest: Option<String>,
    /// Embedding model of the served snapshot
    pub model: Option<EmbeddingModel>,
}

#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub chunk: ChunkConfig,
    /// Persist each installed snapshot here and restore from it
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct RebuildRecord {
    last_error: Option<String>,
    last_outcome: Option<RebuildOutcome>,
    last_attempt_at: Option<DateTime<Utc>>,
    last_duration: Option<Duration>,
}

struct ManagerInner {
    builder: IndexBuilder,
    config: ManagerConfig,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    rebuilding: AtomicBool,
    next_generation: AtomicU64,
    record: Mutex<RebuildRecord>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the served snapshot and coordinates rebuilds.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct IndexManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Clears the rebuild flag when the rebuild task ends, including by panic
/// or cancellation.
struct RebuildGuard {
    inner: Arc<ManagerInner>,
    completed: bool,
}

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        if !self.completed {
            error!("Rebuild task panicked or was cancelled");
            let mut record = lock(&self.inner.record);
            record.last_outcome = Some(RebuildOutcome::Failed);
            record.last_error = Some("rebuild task did not complete".to_string());
        }
        self.inner.rebuilding.store(false, Ordering::Release);
    }
}

impl IndexManager {
    /// Create a manager in the `Empty` state.
    ///
    /// Fails with `InvalidConfig` if the chunk configuration is unusable.
    pub fn new(builder: IndexBuilder, config: ManagerConfig) -> IndexResult<Self> {
        config.chunk.validate()?;

        Ok(Self {
            inner: Arc::new(ManagerInner {
                builder,
                config,
                current: RwLock::new(None),
                rebuilding: AtomicBool::new(false),
                next_generation: AtomicU64::new(1),
                record: Mutex::new(RebuildRecord::default()),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        self.inner.builder.gateway()
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.inner.config.snapshot_path.as_deref()
    }

    /// The snapshot currently served, if any.
    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> LifecycleState {
        if self.inner.rebuilding.load(Ordering::Acquire) {
            LifecycleState::Rebuilding
        } else if self.current().is_some() {
            LifecycleState::Ready
        } else {
            LifecycleState::Empty
        }
    }

    pub fn status(&self) -> IndexStatus {
        let state = self.state();
        let current = self.current();
        let record = lock(&self.inner.record);

        IndexStatus {
            state,
            last_build_at: current.as_ref().map(|s| s.built_at),
            last_error: record.last_error.clone(),
            last_outcome: record.last_outcome,
            last_attempt_at: record.last_attempt_at,
            last_build_duration_ms: record.last_duration.map(|d| d.as_millis() as u64),
            generation: current.as_ref().map(|s| s.generation),
            document_count: current.as_ref().map_or(0, |s| s.document_count),
            chunk_count: current.as_ref().map_or(0, |s| s.chunk_count()),
            source_digest: current.as_ref().map(|s| s.source_digest.clone()),
            model: current.as_ref().map(|s| s.model.clone()),
        }
    }

    /// Start a background rebuild from `source` and return immediately.
    ///
    /// Returns `RebuildInProgress` if a rebuild is already running. Queries
    /// keep using the current snapshot until the new one is installed; a
    /// failed rebuild leaves it untouched.
    pub fn trigger_reindex<S>(&self, source: S) -> IndexResult<()>
    where
        S: DocumentSource + 'static,
    {
        self.spawn_rebuild(Box::new(source), false)
    }

    /// Like [`trigger_reindex`](Self::trigger_reindex), but rebuilds even
    /// when the documents are unchanged.
    pub fn trigger_forced_reindex<S>(&self, source: S) -> IndexResult<()>
    where
        S: DocumentSource + 'static,
    {
        self.spawn_rebuild(Box::new(source), true)
    }

    /// Wait for the most recently triggered rebuild to finish.
    pub async fn wait_for_rebuild(&self) -> IndexStatus {
        let handle = lock(&self.inner.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Rebuild task ended abnormally: {}", e);
            }
        }
        self.status()
    }

    /// Install the persisted snapshot, if one exists and nothing is served yet.
    ///
    /// Returns whether a snapshot was installed. A snapshot built with
    /// different vector dimensions than the configured provider is rejected.
    pub async fn restore(&self) -> IndexResult<bool> {
        let Some(path) = self.inner.config.snapshot_path.clone() else {
            return Ok(false);
        };
        if !path.exists() {
            info!("No persisted snapshot at {:?}", path);
            return Ok(false);
        }
        if self.current().is_some() {
            return Ok(false);
        }

        let loaded = tokio::task::spawn_blocking({
            let path = path.clone();
            move || persist::load_snapshot(&path)
        })
        .await
        .map_err(|e| IndexError::Persistence(format!("snapshot load task failed: {}", e)))??;

        let expected = self.gateway().model();
        if loaded.model != expected {
            return Err(IndexError::Persistence(format!(
                "snapshot {:?} was embedded with {}, configured model is {}",
                path, loaded.model, expected
            )));
        }

        let mut current = self
            .inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if current.is_some() {
            return Ok(false);
        }
        let generation = self.inner.next_generation.fetch_add(1, Ordering::AcqRel);
        let snapshot = Arc::new(loaded.with_generation(generation));
        info!(
            "Restored snapshot from {:?} ({} chunks, built {})",
            path,
            snapshot.chunk_count(),
            snapshot.built_at
        );
        *current = Some(snapshot);
        Ok(true)
    }

    fn spawn_rebuild(&self, source: Box<dyn DocumentSource>, force: bool) -> IndexResult<()> {
        let mut task = lock(&self.inner.task);

        if self
            .inner
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Reindex rejected: a rebuild is already in progress");
            return Err(IndexError::RebuildInProgress);
        }

        info!("Reindex accepted from {}", source.describe());
        let mut guard = RebuildGuard {
            inner: Arc::clone(&self.inner),
            completed: false,
        };
        *task = Some(tokio::spawn(async move {
            guard.inner.run_rebuild(source, force).await;
            guard.completed = true;
        }));
        Ok(())
    }
}

impl ManagerInner {
    async fn run_rebuild(&self, source: Box<dyn DocumentSource>, force: bool) {
        let started = Instant::now();
        lock(&self.record).last_attempt_at = Some(Utc::now());

        let result = self.rebuild_once(source.as_ref(), force).await;
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(Some(snapshot)) => {
                let snapshot = self.install(snapshot);
                self.persist(snapshot).await;
                RebuildOutcome::Installed
            }
            Ok(None) => RebuildOutcome::Unchanged,
            Err(e) => {
                error!("Rebuild failed after {}ms: {}", elapsed.as_millis(), e);
                let mut record = lock(&self.record);
                record.last_outcome = Some(RebuildOutcome::Failed);
                record.last_error = Some(e.to_string());
                record.last_duration = Some(elapsed);
                return;
            }
        };

        info!("Rebuild finished ({:?}) in {}ms", outcome, elapsed.as_millis());
        let mut record = lock(&self.record);
        record.last_outcome = Some(outcome);
        record.last_error = None;
        record.last_duration = Some(elapsed);
    }

    async fn rebuild_once(
        &self,
        source: &dyn DocumentSource,
        force: bool,
    ) -> IndexResult<Option<IndexSnapshot>> {
        let documents = source.load().await?;
        let digest = source_digest(&documents);

        if !force {
            let current = self
                .current
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(current) = current {
                let model = self.builder.gateway().model();
                if current.matches(&digest, &self.config.chunk, &model) {
                    info!(
                        "Documents unchanged since generation {}; keeping current snapshot",
                        current.generation
                    );
                    return Ok(None);
                }
            }
        }

        let snapshot = self.builder.build(&documents, &self.config.chunk).await?;
        Ok(Some(snapshot))
    }

    /// Swap in `snapshot` as the served one. The old snapshot is dropped
    /// once its last reader releases it.
    fn install(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel);
        let snapshot = Arc::new(snapshot.with_generation(generation));

        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.replace(Arc::clone(&snapshot))
        };
        info!(
            "Installed snapshot generation {} ({} documents, {} chunks), replacing {:?}",
            generation,
            snapshot.document_count,
            snapshot.chunk_count(),
            previous.map(|p| p.generation)
        );
        snapshot
    }

    async fn persist(&self, snapshot: Arc<IndexSnapshot>) {
        let Some(path) = self.config.snapshot_path.clone() else {
            return;
        };

        let result = tokio::task::spawn_blocking(move || persist::save_snapshot(&snapshot, &path))
            .await
            .map_err(|e| IndexError::Persistence(format!("snapshot save task failed: {}", e)))
            .and_then(|saved| saved);
        if let Err(e) = result {
            warn!("Snapshot installed but not persisted: {}", e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
