//! Core data model: documents, chunks, vectors and retrieval results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A fixed-dimension embedding, 1:1 with a chunk.
pub type EmbeddingVector = Vec<f32>;

/// Embedding model whose vectors populate an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({} dims)", self.provider, self.model, self.dimensions)
    }
}

/// Ordered key/value metadata attached to documents and chunks.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Scalar metadata value.
///
/// Source formats produce heterogeneous fields; they are narrowed to this
/// closed set when a document is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A loaded source document. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source name plus a content hash prefix
    pub id: String,

    /// File name or other loader-supplied name
    pub source_name: String,

    pub raw_text: String,

    /// SHA-256 of `raw_text`, hex encoded
    pub content_hash: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(source_name: impl Into<String>, raw_text: impl Into<String>, metadata: Metadata) -> Self {
        let source_name = source_name.into();
        let raw_text = raw_text.into();
        let content_hash = content_hash(&raw_text);
        let id = format!("{}#{}", source_name, &content_hash[..12]);

        Self {
            id,
            source_name,
            raw_text,
            content_hash,
            metadata,
        }
    }

    /// Document without metadata.
    pub fn from_text(source_name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self::new(source_name, raw_text, Metadata::new())
    }
}

/// A bounded passage of document text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Derived from `(document_id, ordinal)`
    pub id: String,
    pub document_id: String,

    /// Position within the document, 0-indexed
    pub ordinal: u32,
    pub text: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Deterministic chunk identifier.
    ///
    /// The ordinal is zero-padded so lexical order matches chunking order
    /// within a document.
    pub fn id_for(document_id: &str, ordinal: u32) -> String {
        format!("{}/{:06}", document_id, ordinal)
    }

    /// Name of the source the chunk was cut from, if recorded.
    pub fn source_name(&self) -> Option<&str> {
        self.metadata.get("source").and_then(MetadataValue::as_str)
    }
}

/// One retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    pub score: f32,
}

/// Top-k hits from a single snapshot, highest similarity first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Generation of the snapshot that answered
    pub generation: u64,
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.hits.iter()
    }

    pub fn top(&self) -> Option<&ScoredChunk> {
        self.hits.first()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.hits.iter().map(|h| h.score).collect()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredChunk;
    type IntoIter = std::slice::Iter<'a, ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

/// SHA-256 of text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
