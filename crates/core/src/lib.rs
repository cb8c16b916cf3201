//! Docseek Core Library
//!
//! This crate provides the foundational utilities shared by the docseek crates:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Workspace and index configuration

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ChunkSettings, EmbeddingSettings, IndexSettings, QuerySettings};
pub use error::{AppError, AppResult};
