/// Qdrant collection adapter
///
/// Queries one collection through Qdrant's REST Query API
/// (`POST /collections/{collection}/points/query`) using either a named
/// dense vector (query embedded by the `EmbeddingProvider`) or a named
/// sparse vector (query text encoded by Qdrant with the configured model).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::payload::{to_candidate, CorpusKind};
use super::sparse::SparseDocument;
use super::{BackendError, SearchIndex};
use crate::config::QdrantConfig;
use crate::embedding::EmbeddingProvider;
use crate::search::Candidate;

#[derive(Serialize)]
#[serde(untagged)]
enum QueryVector<'a> {
    Dense(&'a [f32]),
    Sparse(SparseDocument<'a>),
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: QueryVector<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    using: Option<&'a str>,
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointId {
    Num(u64),
    Uuid(String),
}

impl PointId {
    fn into_string(self) -> String {
        match self {
            PointId::Num(n) => n.to_string(),
            PointId::Uuid(s) => s,
        }
    }
}

/// One Qdrant collection exposed as a `SearchIndex`.
pub struct QdrantIndex {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    tag: String,
    kind: CorpusKind,
    dense_vector_name: Option<String>,
    sparse_vector_name: Option<String>,
    sparse_model: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QdrantIndex {
    /// Create an adapter for `collection`.
    ///
    /// An empty `dense_vector_name` targets the collection's unnamed default vector.
    pub fn new(
        kind: CorpusKind,
        collection: &str,
        config: &QdrantConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let dense_vector_name = Some(config.dense_vector_name.clone()).filter(|n| !n.is_empty());
        let sparse_vector_name = config.sparse_vector_name.clone().filter(|n| !n.is_empty());

        QdrantIndex {
            client: reqwest::Client::new(),
            url: format!(
                "{}/collections/{}/points/query",
                config.url.trim_end_matches('/'),
                collection
            ),
            api_key: config.api_key.clone(),
            tag: kind.as_str().to_string(),
            kind,
            dense_vector_name,
            sparse_vector_name,
            sparse_model: config.sparse_model.clone(),
            embedder,
        }
    }

    async fn query(&self, request: &QueryRequest<'_>) -> Result<Vec<Candidate>, BackendError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BackendError::Unavailable(format!(
                "Qdrant returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse Qdrant response: {}", e)))?;

        Ok(self.to_candidates(body))
    }

    fn to_candidates(&self, body: QueryResponse) -> Vec<Candidate> {
        let empty = Map::new();
        body.result
            .points
            .into_iter()
            .map(|p| {
                to_candidate(
                    self.kind,
                    &self.tag,
                    p.id.into_string(),
                    p.score,
                    p.payload.as_ref().unwrap_or(&empty),
                )
            })
            .collect()
    }
}

#[async_trait]
impl SearchIndex for QdrantIndex {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn supports_sparse(&self) -> bool {
        self.sparse_vector_name.is_some()
    }

    async fn dense_search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, BackendError> {
        let vector = self.embedder.embed(query).await?;
        let request = QueryRequest {
            query: QueryVector::Dense(&vector),
            using: self.dense_vector_name.as_deref(),
            limit,
            with_payload: true,
        };
        let hits = self.query(&request).await?;
        tracing::debug!(backend = %self.tag, leg = "dense", hits = hits.len(), "Qdrant query complete");
        Ok(hits)
    }

    async fn sparse_search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, BackendError> {
        let Some(name) = self.sparse_vector_name.as_deref() else {
            return Err(BackendError::SparseUnsupported);
        };
        let Some(document) = SparseDocument::new(query, &self.sparse_model) else {
            return Ok(Vec::new());
        };
        let request = QueryRequest {
            query: QueryVector::Sparse(document),
            using: Some(name),
            limit,
            with_payload: true,
        };
        let hits = self.query(&request).await?;
        tracing::debug!(backend = %self.tag, leg = "sparse", hits = hits.len(), "Qdrant query complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use serde_json::json;

    struct NoEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NoEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::NotConfigured("test".into()))
        }

        fn model_name(&self) -> &str {
            "none"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn index(config: &QdrantConfig) -> QdrantIndex {
        QdrantIndex::new(CorpusKind::Documents, "brew_books", config, Arc::new(NoEmbedder))
    }

    #[test]
    fn test_dense_request_shape() {
        let vector = [0.1f32, 0.2];
        let request = QueryRequest {
            query: QueryVector::Dense(&vector),
            using: Some("dense"),
            limit: 5,
            with_payload: true,
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["using"], "dense");
        assert_eq!(v["limit"], 5);
        assert_eq!(v["query"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_sparse_request_shape() {
        let request = QueryRequest {
            query: QueryVector::Sparse(SparseDocument::new("bittering hops", "qdrant/bm25").unwrap()),
            using: Some("sparse"),
            limit: 4,
            with_payload: true,
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["query"], json!({ "text": "bittering hops", "model": "qdrant/bm25" }));
        assert_eq!(v["limit"], 4);
        assert_eq!(v["using"], "sparse");
    }

    #[test]
    fn test_unnamed_dense_vector_omits_using() {
        let vector = [0.5f32];
        let request = QueryRequest {
            query: QueryVector::Dense(&vector),
            using: None,
            limit: 1,
            with_payload: true,
        };
        let v = serde_json::to_value(&request).unwrap();
        assert!(v.get("using").is_none());
    }

    #[test]
    fn test_response_maps_points_in_order() {
        let config = QdrantConfig::default();
        let idx = index(&config);
        let body: QueryResponse = serde_json::from_value(json!({
            "result": { "points": [
                { "id": 12, "version": 1, "score": 0.83,
                  "payload": { "name": "hops.pdf", "content": "Bittering hops...", "meta_data": { "page": 3 } } },
                { "id": "5f0c6a8e-0000-4000-8000-000000000001", "version": 1, "score": 0.61 }
            ] },
            "status": "ok",
            "time": 0.002
        }))
        .unwrap();

        let hits = idx.to_candidates(body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "12");
        assert_eq!(hits[0].backend, "documents");
        assert_eq!(hits[0].page(), Some(3));
        assert_eq!(hits[1].id, "5f0c6a8e-0000-4000-8000-000000000001");
        assert_eq!(hits[1].content, "");
    }

    #[test]
    fn test_empty_points_is_empty_list() {
        let config = QdrantConfig::default();
        let idx = index(&config);
        let body: QueryResponse = serde_json::from_value(json!({ "result": { "points": [] } })).unwrap();
        assert!(idx.to_candidates(body).is_empty());
    }

    #[test]
    fn test_sparse_support_follows_config() {
        let with_sparse = QdrantConfig::default();
        assert!(index(&with_sparse).supports_sparse());

        let without = QdrantConfig {
            sparse_vector_name: None,
            ..QdrantConfig::default()
        };
        assert!(!index(&without).supports_sparse());
    }

    #[tokio::test]
    async fn test_sparse_search_unsupported() {
        let config = QdrantConfig {
            sparse_vector_name: None,
            ..QdrantConfig::default()
        };
        let err = index(&config).sparse_search("ipa", 5).await.unwrap_err();
        assert!(matches!(err, BackendError::SparseUnsupported));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_unavailable() {
        let config = QdrantConfig::default();
        let err = index(&config).dense_search("ipa", 5).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_blank_sparse_query_is_empty() {
        // any request to this url fails, so an empty Ok means no request was sent
        let config = QdrantConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..QdrantConfig::default()
        };
        let hits = index(&config).sparse_search("   ", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_sparse_model_follows_config() {
        let config = QdrantConfig {
            sparse_model: "qdrant/bm42-all-minilm-l6-v2-attentions".to_string(),
            ..QdrantConfig::default()
        };
        assert_eq!(index(&config).sparse_model, "qdrant/bm42-all-minilm-l6-v2-attentions");
        assert_eq!(index(&QdrantConfig::default()).sparse_model, "qdrant/bm25");
    }

    #[test]
    fn test_url_and_tag() {
        let config = QdrantConfig {
            url: "http://qdrant:6333/".to_string(),
            ..QdrantConfig::default()
        };
        let idx = QdrantIndex::new(CorpusKind::Recipes, "brew_recipes", &config, Arc::new(NoEmbedder));
        assert_eq!(idx.url, "http://qdrant:6333/collections/brew_recipes/points/query");
        assert_eq!(idx.tag(), "recipes");
    }
}
