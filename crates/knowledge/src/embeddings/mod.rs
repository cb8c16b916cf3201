//! Embedding layer.
//!
//! Providers wrap an external model behind [`EmbeddingProvider`]; the
//! [`EmbeddingGateway`] is the only caller and adds batching, retry with
//! exponential backoff, and translation into [`crate::IndexError`].

pub mod gateway;
pub mod provider;
pub mod providers;

pub use gateway::{EmbeddingGateway, GatewayConfig};
pub use provider::{create_provider, EmbeddingProvider, ProviderError, ProviderErrorKind};
