/// Searchable index abstraction
///
/// A `SearchIndex` wraps one underlying collection and exposes its dense
/// (embedding) and, optionally, sparse (term-weighted) similarity search.
/// `HybridQueryPlanner` turns an index into a `RetrievalBackend`.

pub mod payload;
pub mod qdrant;
pub mod sparse;

use async_trait::async_trait;
use thiserror::Error;

use crate::search::Candidate;

/// Errors a backend may report. Any of them excludes the backend from fusion
/// for the current query; "no results" is never an error.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport or connection failure, or a non-success HTTP status
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer within the per-backend deadline
    #[error("Backend timed out after {0} ms")]
    Timeout(u64),

    /// Sparse retrieval requested from an index without a sparse vector
    #[error("Backend does not support sparse retrieval")]
    SparseUnsupported,

    /// Backend answered with something that could not be decoded
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl From<crate::embedding::EmbeddingError> for BackendError {
    fn from(e: crate::embedding::EmbeddingError) -> Self {
        BackendError::Unavailable(format!("query embedding failed: {}", e))
    }
}

/// Core trait for a single searchable collection.
///
/// Implementations are shared across concurrent queries (Arc<dyn SearchIndex>)
/// and must not keep per-query mutable state.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Stable tag naming this backend (e.g., "documents", "recipes")
    fn tag(&self) -> &str;

    /// Whether `sparse_search` is available.
    fn supports_sparse(&self) -> bool {
        false
    }

    /// Best-first candidates by embedding similarity, at most `limit`.
    async fn dense_search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, BackendError>;

    /// Best-first candidates by term-weighted similarity, at most `limit`.
    async fn sparse_search(&self, _query: &str, _limit: usize) -> Result<Vec<Candidate>, BackendError> {
        Err(BackendError::SparseUnsupported)
    }
}
