/// Search orchestration: Dispatch → Collect → Fuse → (Rerank) → Deliver
///
/// Holds the configured indexes and the optional reranker and always calls
/// them through this one code path. Backends run concurrently, each under its
/// own deadline; failed or late backends are excluded from fusion, and a
/// failed rerank falls back to the fused order. Only the loss of every
/// backend fails the query.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::fusion::RrfFusion;
use super::hybrid::{HybridQueryPlanner, RetrievalBackend, RetrievalMode};
use super::{Candidate, RankedList, SearchHit};
use crate::backend::payload::CorpusKind;
use crate::backend::qdrant::QdrantIndex;
use crate::backend::{BackendError, SearchIndex};
use crate::config::Config;
use crate::embedding::openai::OpenAIEmbeddingProvider;
use crate::embedding::EmbeddingProvider;
use crate::errors::OracleError;
use crate::rerank::http::HttpCrossEncoder;
use crate::rerank::CrossEncoderReranker;

/// Pipeline stage, recorded on log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Dispatch,
    Collect,
    Fuse,
    Rerank,
    Deliver,
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchStage::Dispatch => "dispatch",
            SearchStage::Collect => "collect",
            SearchStage::Fuse => "fuse",
            SearchStage::Rerank => "rerank",
            SearchStage::Deliver => "deliver",
        };
        f.write_str(name)
    }
}

/// One query with its per-call knobs.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Bounds per-backend fan-out and the final result length
    pub top_k: usize,
    pub rerank: bool,
    pub hybrid: bool,
}

/// A backend excluded from this query.
#[derive(Debug, Clone, Serialize)]
pub struct BackendFailure {
    pub backend: String,
    pub reason: String,
}

/// Delivered result of one search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Final ranking, best first, never longer than top_k
    pub hits: Vec<SearchHit>,
    /// Backends that failed or timed out and were left out of fusion
    pub unavailable: Vec<BackendFailure>,
    /// Whether the cross-encoder order was applied
    pub reranked: bool,
}

impl SearchOutcome {
    pub fn candidates(&self) -> Vec<&Candidate> {
        self.hits.iter().map(|h| &h.candidate).collect()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.hits.into_iter().map(|h| h.candidate).collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.unavailable.is_empty()
    }
}

/// Facade exposed to the conversational layer.
pub struct SearchOrchestrator {
    indexes: Vec<Arc<dyn SearchIndex>>,
    reranker: Option<CrossEncoderReranker>,
    fusion: RrfFusion,
    backend_timeout: Duration,
    top_k: NonZeroUsize,
    hybrid: bool,
    rerank: bool,
}

impl SearchOrchestrator {
    pub fn builder() -> SearchOrchestratorBuilder {
        SearchOrchestratorBuilder::default()
    }

    /// Wire Qdrant-backed indexes, the embedding provider and (if enabled)
    /// the HTTP cross-encoder from configuration.
    pub fn from_config(config: &Config) -> Result<Self, OracleError> {
        config.validate()?;

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAIEmbeddingProvider::new(&config.embedding)?);

        let mut builder = SearchOrchestrator::builder()
            .top_k(config.retrieval.top_k)
            .rrf_offset(config.retrieval.rrf_offset)
            .backend_timeout(config.retrieval.backend_timeout())
            .hybrid(config.retrieval.hybrid)
            .rerank(config.rerank.enabled);

        for (kind, collection) in [
            (CorpusKind::Documents, &config.documents),
            (CorpusKind::Recipes, &config.recipes),
        ] {
            if collection.enabled {
                builder = builder.index(Arc::new(QdrantIndex::new(
                    kind,
                    &collection.collection,
                    &config.qdrant,
                    embedder.clone(),
                )));
            }
        }

        if config.rerank.enabled {
            let scorer = HttpCrossEncoder::new(&config.rerank)?;
            builder = builder.reranker(CrossEncoderReranker::new(Arc::new(scorer)));
        }

        builder.build()
    }

    /// A request carrying this orchestrator's configured defaults.
    pub fn request(&self, query: impl Into<String>) -> SearchRequest {
        SearchRequest {
            query: query.into(),
            top_k: self.top_k.get(),
            rerank: self.rerank,
            hybrid: self.hybrid,
        }
    }

    pub fn backend_tags(&self) -> Vec<&str> {
        self.indexes.iter().map(|i| i.tag()).collect()
    }

    /// Run one query end to end.
    ///
    /// Dropping the returned future abandons every in-flight backend and
    /// rerank call.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, OracleError> {
        let started = Instant::now();
        let (planners, top_k) = self.plan(request)?;
        let query = request.query.as_str();

        tracing::debug!(stage = %SearchStage::Dispatch, backends = planners.len(), top_k = top_k.get(), hybrid = request.hybrid, "Dispatching query");
        let timeout = self.backend_timeout;
        let calls = planners.iter().map(|planner| async move {
            let call_started = Instant::now();
            let result = match tokio::time::timeout(timeout, planner.retrieve(query, top_k)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(timeout.as_millis() as u64)),
            };
            (planner.tag().to_string(), result, call_started.elapsed())
        });
        let results = futures::future::join_all(calls).await;

        let attempted = results.len();
        let mut lists: Vec<RankedList> = Vec::with_capacity(attempted);
        let mut unavailable = Vec::new();
        for (backend, result, elapsed) in results {
            match result {
                Ok(list) => {
                    tracing::debug!(
                        stage = %SearchStage::Collect,
                        backend = %backend,
                        hits = list.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Backend returned"
                    );
                    lists.push(list);
                }
                Err(e) => {
                    tracing::warn!(
                        stage = %SearchStage::Collect,
                        backend = %backend,
                        error = %e,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Backend unavailable, excluding from fusion"
                    );
                    unavailable.push(BackendFailure {
                        backend,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if lists.is_empty() {
            tracing::error!(attempted, "All backends unavailable");
            return Err(OracleError::NoBackendsAvailable { attempted });
        }

        let hits: Vec<SearchHit> = self
            .fusion
            .fuse(&lists, top_k)
            .into_iter()
            .map(|f| SearchHit {
                candidate: f.candidate,
                fusion_score: f.fusion_score,
                rerank_score: None,
            })
            .collect();
        tracing::debug!(stage = %SearchStage::Fuse, lists = lists.len(), hits = hits.len(), "Fused backend lists");

        let (hits, reranked) = match (&self.reranker, request.rerank) {
            (Some(reranker), true) => match reranker.rerank_hits(query, hits.clone()).await {
                Ok(reordered) => (reordered, true),
                Err(e) => {
                    tracing::warn!(
                        stage = %SearchStage::Rerank,
                        model = %reranker.model_name(),
                        error = %e,
                        "Rerank failed, delivering fused order"
                    );
                    (hits, false)
                }
            },
            _ => (hits, false),
        };

        tracing::info!(
            stage = %SearchStage::Deliver,
            hits = hits.len(),
            unavailable = unavailable.len(),
            reranked,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search delivered"
        );

        Ok(SearchOutcome {
            hits,
            unavailable,
            reranked,
        })
    }

    /// Run `search`, abandoning it with `Cancelled` as soon as `cancel` completes.
    ///
    /// A cancelled search returns nothing computed so far.
    pub async fn search_until<F>(&self, request: &SearchRequest, cancel: F) -> Result<SearchOutcome, OracleError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::info!("Search cancelled by caller");
                Err(OracleError::Cancelled)
            }
            outcome = self.search(request) => outcome,
        }
    }

    /// Validate per-call flags before any I/O and build one planner per index.
    fn plan(&self, request: &SearchRequest) -> Result<(Vec<HybridQueryPlanner>, NonZeroUsize), OracleError> {
        let top_k = NonZeroUsize::new(request.top_k)
            .ok_or_else(|| OracleError::invalid_config("top_k", "top_k must be greater than zero"))?;
        if request.rerank && self.reranker.is_none() {
            return Err(OracleError::invalid_config(
                "rerank",
                "reranking requested but no reranker is configured",
            ));
        }
        let mode = RetrievalMode::from_hybrid(request.hybrid);
        let planners = self
            .indexes
            .iter()
            .map(|index| HybridQueryPlanner::new(index.clone(), mode, self.fusion))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((planners, top_k))
    }
}

/// Builder validating the orchestrator's static configuration.
pub struct SearchOrchestratorBuilder {
    indexes: Vec<Arc<dyn SearchIndex>>,
    reranker: Option<CrossEncoderReranker>,
    top_k: usize,
    rrf_offset: f64,
    backend_timeout: Duration,
    hybrid: bool,
    rerank: bool,
}

impl Default for SearchOrchestratorBuilder {
    fn default() -> Self {
        SearchOrchestratorBuilder {
            indexes: Vec::new(),
            reranker: None,
            top_k: 20,
            rrf_offset: super::fusion::DEFAULT_RRF_OFFSET,
            backend_timeout: Duration::from_secs(5),
            hybrid: false,
            rerank: false,
        }
    }
}

impl SearchOrchestratorBuilder {
    /// Add a backend; fusion tie-breaks follow the order indexes are added.
    pub fn index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn reranker(mut self, reranker: CrossEncoderReranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn rrf_offset(mut self, offset: f64) -> Self {
        self.rrf_offset = offset;
        self
    }

    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn build(self) -> Result<SearchOrchestrator, OracleError> {
        if self.indexes.is_empty() {
            return Err(OracleError::invalid_config("backends", "at least one backend must be configured"));
        }
        let top_k = NonZeroUsize::new(self.top_k)
            .ok_or_else(|| OracleError::invalid_config("retrieval.top_k", "top_k must be greater than zero"))?;
        if self.backend_timeout.is_zero() {
            return Err(OracleError::invalid_config(
                "retrieval.backend_timeout_ms",
                "backend timeout must be greater than zero",
            ));
        }
        let fusion = RrfFusion::new(self.rrf_offset)?;
        if self.hybrid {
            if let Some(index) = self.indexes.iter().find(|i| !i.supports_sparse()) {
                return Err(OracleError::InvalidConfiguration {
                    message: format!(
                        "hybrid retrieval requested but backend '{}' does not support sparse retrieval",
                        index.tag()
                    ),
                    field: Some("retrieval.hybrid".to_string()),
                });
            }
        }
        if self.rerank && self.reranker.is_none() {
            return Err(OracleError::invalid_config(
                "rerank.enabled",
                "reranking enabled but no reranker is configured",
            ));
        }

        tracing::info!(
            backends = self.indexes.len(),
            top_k = top_k.get(),
            rrf_offset = fusion.offset(),
            hybrid = self.hybrid,
            rerank = self.rerank,
            "Search orchestrator ready"
        );

        Ok(SearchOrchestrator {
            indexes: self.indexes,
            reranker: self.reranker,
            fusion,
            backend_timeout: self.backend_timeout,
            top_k,
            hybrid: self.hybrid,
            rerank: self.rerank,
        })
    }
}
