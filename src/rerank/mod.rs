/// Cross-encoder reranking
///
/// A second pass over an already bounded candidate set: every
/// (query, candidate content) pair is scored in one batch by a shared
/// `PairScorer`, then candidates are re-sorted by descending score.
/// The transform is a pure permutation and stable on ties.

pub mod http;

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

use crate::search::{Candidate, SearchHit};

/// Errors raised by a pairwise scoring model.
#[derive(Debug, Error)]
pub enum ScorerError {
    /// Transport failure before a response arrived
    #[error("Scoring request failed: {0}")]
    Request(String),

    /// Scoring endpoint returned an HTTP error
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response could not be aligned with the submitted pairs
    #[error("Invalid scoring response: {0}")]
    InvalidResponse(String),

    /// Provider not configured (e.g., missing endpoint)
    #[error("Scorer not configured: {0}")]
    NotConfigured(String),
}

/// The reranker could not produce scores; callers fall back to the incoming order.
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("Rerank unavailable: {0}")]
    Unavailable(String),
}

impl From<ScorerError> for RerankError {
    fn from(e: ScorerError) -> Self {
        RerankError::Unavailable(e.to_string())
    }
}

/// Core trait for a pairwise relevance model (cross-encoder).
///
/// Implementations must be Send + Sync; one instance serves concurrent queries.
#[async_trait]
pub trait PairScorer: Send + Sync {
    /// Score each (query, text) pair; one float per text, in input order.
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, ScorerError>;

    /// Return the model name identifier (e.g., "cross-encoder/ms-marco-MiniLM-L-6-v2").
    fn model_name(&self) -> &str;
}

/// Reorders candidates by cross-encoder score.
#[derive(Clone)]
pub struct CrossEncoderReranker {
    scorer: Arc<dyn PairScorer>,
}

impl CrossEncoderReranker {
    pub fn new(scorer: Arc<dyn PairScorer>) -> Self {
        CrossEncoderReranker { scorer }
    }

    pub fn model_name(&self) -> &str {
        self.scorer.model_name()
    }

    /// Reorder `candidates` by descending relevance to `query`.
    ///
    /// Scores exactly `candidates.len()` pairs, so callers bound the set first.
    pub async fn rerank(&self, query: &str, candidates: Vec<Candidate>) -> Result<Vec<Candidate>, RerankError> {
        let texts: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        let order = self.order(query, &texts).await?;
        Ok(permute(candidates, &order).into_iter().map(|(c, _)| c).collect())
    }

    /// Same as `rerank`, recording each hit's score in `rerank_score`.
    pub async fn rerank_hits(&self, query: &str, hits: Vec<SearchHit>) -> Result<Vec<SearchHit>, RerankError> {
        let texts: Vec<String> = hits.iter().map(|h| h.candidate.content.clone()).collect();
        let order = self.order(query, &texts).await?;
        Ok(permute(hits, &order)
            .into_iter()
            .map(|(hit, score)| SearchHit {
                rerank_score: Some(score),
                ..hit
            })
            .collect())
    }

    /// Indices into `texts` best-first, paired with their scores.
    async fn order(&self, query: &str, texts: &[String]) -> Result<Vec<(usize, f32)>, RerankError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.scorer.score(query, texts).await?;
        if scores.len() != texts.len() {
            return Err(RerankError::Unavailable(format!(
                "scorer returned {} scores for {} pairs",
                scores.len(),
                texts.len()
            )));
        }

        let mut order: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        // stable: equal scores keep incoming order
        order.sort_by(|a, b| descending(a.1, b.1));

        tracing::debug!(
            model = %self.scorer.model_name(),
            pairs = texts.len(),
            "Rerank scored candidate pairs"
        );
        Ok(order)
    }
}

/// Descending by score; NaN sorts after every number.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

fn permute<T>(items: Vec<T>, order: &[(usize, f32)]) -> Vec<(T, f32)> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|&(idx, score)| slots.get_mut(idx).and_then(Option::take).map(|item| (item, score)))
        .collect()
}
