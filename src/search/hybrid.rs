/// Hybrid sparse/dense query planning
///
/// In hybrid mode the planner issues a dense and a sparse sub-retrieval
/// against the same index concurrently and fuses them with the same
/// reciprocal-rank rule the orchestrator applies across backends. In
/// dense-only mode it is a passthrough to the dense sub-retrieval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::fusion::RrfFusion;
use super::{Candidate, RankedList};
use crate::backend::{BackendError, SearchIndex};
use crate::errors::OracleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalMode {
    DenseOnly,
    Hybrid,
}

impl RetrievalMode {
    pub fn from_hybrid(hybrid: bool) -> Self {
        if hybrid {
            RetrievalMode::Hybrid
        } else {
            RetrievalMode::DenseOnly
        }
    }
}

/// Uniform retrieval contract consumed by the orchestrator.
///
/// Returns at most `limit` candidates best-first; an empty list when nothing
/// matches. Errors are reserved for transport-level failure.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    fn tag(&self) -> &str;

    async fn retrieve(&self, query: &str, limit: NonZeroUsize) -> Result<RankedList, BackendError>;
}

/// Retrieval backend over one `SearchIndex` in a fixed mode.
pub struct HybridQueryPlanner {
    index: Arc<dyn SearchIndex>,
    mode: RetrievalMode,
    fusion: RrfFusion,
}

impl HybridQueryPlanner {
    /// Fails with `InvalidConfiguration` when hybrid mode is requested for an
    /// index without sparse support.
    pub fn new(index: Arc<dyn SearchIndex>, mode: RetrievalMode, fusion: RrfFusion) -> Result<Self, OracleError> {
        if mode == RetrievalMode::Hybrid && !index.supports_sparse() {
            return Err(OracleError::InvalidConfiguration {
                message: format!(
                    "hybrid retrieval requested but backend '{}' does not support sparse retrieval",
                    index.tag()
                ),
                field: Some("hybrid".to_string()),
            });
        }
        Ok(HybridQueryPlanner { index, mode, fusion })
    }

    async fn hybrid(&self, query: &str, limit: NonZeroUsize) -> Result<RankedList, BackendError> {
        let tag = self.index.tag();
        let (dense, sparse) = tokio::join!(
            self.index.dense_search(query, limit.get()),
            self.index.sparse_search(query, limit.get()),
        );

        match (dense, sparse) {
            (Ok(dense), Ok(sparse)) => {
                let legs = [
                    bounded(tag, dense, limit),
                    bounded(tag, sparse, limit),
                ];
                let fused: Vec<Candidate> = self
                    .fusion
                    .fuse(&legs, limit)
                    .into_iter()
                    .map(|f| Candidate {
                        score: f.fusion_score as f32,
                        ..f.candidate
                    })
                    .collect();
                tracing::debug!(
                    backend = %tag,
                    dense = legs[0].len(),
                    sparse = legs[1].len(),
                    fused = fused.len(),
                    "Hybrid legs fused"
                );
                Ok(RankedList::new(tag, fused))
            }
            (Ok(dense), Err(e)) => {
                tracing::warn!(backend = %tag, error = %e, "Sparse leg failed, using dense results only");
                Ok(bounded(tag, dense, limit))
            }
            (Err(e), Ok(sparse)) => {
                tracing::warn!(backend = %tag, error = %e, "Dense leg failed, using sparse results only");
                Ok(bounded(tag, sparse, limit))
            }
            (Err(dense_err), Err(sparse_err)) => Err(BackendError::Unavailable(format!(
                "dense: {}; sparse: {}",
                dense_err, sparse_err
            ))),
        }
    }
}

#[async_trait]
impl RetrievalBackend for HybridQueryPlanner {
    fn tag(&self) -> &str {
        self.index.tag()
    }

    async fn retrieve(&self, query: &str, limit: NonZeroUsize) -> Result<RankedList, BackendError> {
        match self.mode {
            RetrievalMode::DenseOnly => {
                let dense = self.index.dense_search(query, limit.get()).await?;
                Ok(bounded(self.index.tag(), dense, limit))
            }
            RetrievalMode::Hybrid => self.hybrid(query, limit).await,
        }
    }
}

fn bounded(tag: &str, candidates: Vec<Candidate>, limit: NonZeroUsize) -> RankedList {
    let mut list = RankedList::new(tag, candidates);
    list.truncate(limit.get());
    list
}
