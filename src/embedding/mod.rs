/// Embedding provider trait and supporting types
///
/// Query embedding is a collaborator of the search core: backends call a
/// provider internally to turn query text into a dense vector.

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Request never produced a usable body
    #[error("Query embedding failed: {0}")]
    Generation(String),

    #[error("Embedding endpoint returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// Vector length disagrees with the collection's dense vector size
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Embedding provider not configured: {0}")]
    NotConfigured(String),
}

/// Turns query text into the dense vector a collection was indexed with.
///
/// One provider is shared by every dense-capable backend, so it must be
/// usable from concurrent queries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Model identifier, logged with each query
    fn model_name(&self) -> &str;

    /// Length of every vector `embed` returns
    fn dimension(&self) -> usize;
}
