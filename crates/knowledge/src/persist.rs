//! On-disk snapshot persistence.
//!
//! A snapshot is written as one JSON document next to its final path and
//! renamed into place, so readers never observe a partial file.

use crate::chunker::ChunkConfig;
use crate::error::{IndexError, IndexResult};
use crate::snapshot::IndexSnapshot;
use crate::types::{Chunk, EmbeddingModel};
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FORMAT_VERSION: u32 = 2;

#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    format_version: u32,
    generation: u64,
    built_at: DateTime<Utc>,
    source_digest: &'a str,
    chunk_config: ChunkConfig,
    model: &'a EmbeddingModel,
    document_count: usize,
    dimensions: usize,
    chunks: &'a [Arc<Chunk>],
    vectors: Vec<&'a [f32]>,
}

#[derive(Deserialize)]
struct SnapshotFile {
    format_version: u32,
    generation: u64,
    built_at: DateTime<Utc>,
    source_digest: String,
    chunk_config: ChunkConfig,
    model: EmbeddingModel,
    document_count: usize,
    dimensions: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

/// Write `snapshot` to `path`, replacing any previous file.
pub fn save_snapshot(snapshot: &IndexSnapshot, path: &Path) -> IndexResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| persistence("create directory", parent, e))?;
        }
    }

    let body = SnapshotFileRef {
        format_version: FORMAT_VERSION,
        generation: snapshot.generation,
        built_at: snapshot.built_at,
        source_digest: &snapshot.source_digest,
        chunk_config: snapshot.chunk_config,
        model: &snapshot.model,
        document_count: snapshot.document_count,
        dimensions: snapshot.dimensions(),
        chunks: snapshot.chunk_records(),
        vectors: snapshot.index().vectors().collect(),
    };

    let tmp_path = temp_path(path);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| persistence("open", &tmp_path, e))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &body)
        .map_err(|e| IndexError::Persistence(format!("failed to serialize snapshot: {}", e)))?;
    writer.flush().map_err(|e| persistence("write", &tmp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| persistence("sync", &tmp_path, e))?;

    fs::rename(&tmp_path, path).map_err(|e| persistence("rename", path, e))?;

    tracing::debug!(
        "Saved snapshot generation {} ({} chunks) to {:?}",
        snapshot.generation,
        snapshot.chunk_count(),
        path
    );
    Ok(())
}

/// Read a snapshot written by [`save_snapshot`].
///
/// The index is rebuilt from the stored vectors, so a file whose vectors
/// disagree with its chunk list or declared dimensions is rejected.
pub fn load_snapshot(path: &Path) -> IndexResult<IndexSnapshot> {
    let file = File::open(path).map_err(|e| persistence("open", path, e))?;
    let stored: SnapshotFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| IndexError::Persistence(format!("corrupt snapshot {:?}: {}", path, e)))?;

    if stored.format_version != FORMAT_VERSION {
        return Err(IndexError::Persistence(format!(
            "unsupported snapshot format version {} in {:?}",
            stored.format_version, path
        )));
    }
    stored
        .chunk_config
        .validate()
        .map_err(|e| IndexError::Persistence(format!("snapshot {:?}: {}", path, e)))?;

    let index = VectorIndex::build(stored.vectors, stored.chunks)
        .map_err(|e| IndexError::Persistence(format!("snapshot {:?}: {}", path, e)))?;
    if !index.is_empty()
        && (index.dimensions() != stored.dimensions || index.dimensions() != stored.model.dimensions)
    {
        return Err(IndexError::Persistence(format!(
            "snapshot {:?} declares {} dimensions but stores {}",
            path,
            stored.dimensions,
            index.dimensions()
        )));
    }

    Ok(IndexSnapshot::new(
        index,
        stored.source_digest,
        stored.chunk_config,
        stored.model,
        stored.document_count,
    )
    .with_generation(stored.generation)
    .with_built_at(stored.built_at))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn persistence(action: &str, path: &Path, err: std::io::Error) -> IndexError {
    IndexError::Persistence(format!("failed to {} {:?}: {}", action, path, err))
}
