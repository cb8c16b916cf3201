//! Error types for indexing and retrieval.

use docseek_core::AppError;
use thiserror::Error;

/// Errors raised by the indexing and query pipeline.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Bad chunking parameters, rejected before any work starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding provider could not produce vectors.
    #[error("embedding unavailable after {attempts} attempt(s): {reason}")]
    EmbeddingUnavailable { attempts: u32, reason: String },

    /// Index construction failed; the served snapshot is untouched.
    #[error("build aborted: {reason}")]
    BuildAborted {
        reason: String,
        #[source]
        source: Option<Box<IndexError>>,
    },

    #[error("a rebuild is already in progress")]
    RebuildInProgress,

    #[error("the current index has no chunks")]
    EmptyIndex,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Query-level wrapper around an embedding or search failure.
    #[error("query failed: {source}")]
    QueryFailed {
        #[source]
        source: Box<IndexError>,
    },

    /// The document source could not be read.
    #[error("document source error: {0}")]
    Source(String),

    /// A snapshot file could not be written or read back.
    #[error("snapshot persistence error: {0}")]
    Persistence(String),
}

/// Flat classification of [`IndexError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfig,
    EmbeddingUnavailable,
    BuildAborted,
    RebuildInProgress,
    EmptyIndex,
    InvalidArgument,
    QueryFailed,
    Source,
    Persistence,
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::EmbeddingUnavailable { .. } => ErrorKind::EmbeddingUnavailable,
            Self::BuildAborted { .. } => ErrorKind::BuildAborted,
            Self::RebuildInProgress => ErrorKind::RebuildInProgress,
            Self::EmptyIndex => ErrorKind::EmptyIndex,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::QueryFailed { .. } => ErrorKind::QueryFailed,
            Self::Source(_) => ErrorKind::Source,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Kind of the innermost wrapped cause.
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            Self::QueryFailed { source } => source.root_kind(),
            Self::BuildAborted {
                source: Some(source),
                ..
            } => source.root_kind(),
            other => other.kind(),
        }
    }

    pub(crate) fn aborted(reason: impl Into<String>) -> Self {
        Self::BuildAborted {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn aborted_by(cause: IndexError) -> Self {
        Self::BuildAborted {
            reason: cause.to_string(),
            source: Some(Box::new(cause)),
        }
    }

    pub(crate) fn query_failed(cause: IndexError) -> Self {
        Self::QueryFailed {
            source: Box::new(cause),
        }
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::InvalidConfig(msg) => AppError::Config(msg),
            other => AppError::Index(other.to_string()),
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
