/// HTTP cross-encoder scorer
///
/// Calls a rerank endpoint (text-embeddings-inference, Jina, Cohere shape)
/// serving a cross-encoder such as cross-encoder/ms-marco-MiniLM-L-6-v2.
/// Request: {"model", "query", "documents"} (TEI also reads "texts").
/// Response: a "results" (or "data") array, or a bare array, of
/// {"index", "relevance_score" | "score"} items in any order.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{PairScorer, ScorerError};
use crate::config::RerankConfig;

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    texts: &'a [String],
}

/// Cross-encoder reached over HTTP.
pub struct HttpCrossEncoder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCrossEncoder {
    /// Create a new HttpCrossEncoder from rerank configuration.
    ///
    /// # Errors
    /// Returns `ScorerError::NotConfigured` if the base URL is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: &RerankConfig) -> Result<Self, ScorerError> {
        if config.base_url.trim().is_empty() {
            return Err(ScorerError::NotConfigured(
                "rerank.base_url is required when reranking is enabled. \
                 Set BREW_ORACLE_RERANK__BASE_URL or rerank.base_url in brew-oracle.toml"
                    .to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ScorerError::NotConfigured(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpCrossEncoder {
            client,
            url: format!("{}{}", config.base_url.trim_end_matches('/'), config.path),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PairScorer for HttpCrossEncoder {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, ScorerError> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents: texts,
            texts,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ScorerError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ScorerError::Api { status, message: body });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ScorerError::InvalidResponse(format!("Failed to parse rerank response: {}", e)))?;

        parse_rerank_response(&json, texts.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Align scored items back to input order. Every input index must be scored exactly once.
fn parse_rerank_response(json: &Value, doc_count: usize) -> Result<Vec<f32>, ScorerError> {
    let results = json
        .get("results")
        .or_else(|| json.get("data"))
        .unwrap_or(json)
        .as_array()
        .ok_or_else(|| ScorerError::InvalidResponse("Rerank response is missing results array".to_string()))?;

    let mut scores: Vec<Option<f32>> = vec![None; doc_count];
    for item in results {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .ok_or_else(|| ScorerError::InvalidResponse("Rerank result missing index".to_string()))?
            as usize;
        let score = item
            .get("relevance_score")
            .or_else(|| item.get("score"))
            .and_then(Value::as_f64)
            .ok_or_else(|| ScorerError::InvalidResponse("Rerank result missing score".to_string()))?
            as f32;
        let Some(slot) = scores.get_mut(index) else {
            return Err(ScorerError::InvalidResponse(format!(
                "Rerank index {} out of range for {} documents",
                index, doc_count
            )));
        };
        if slot.is_some() {
            return Err(ScorerError::InvalidResponse(format!("Rerank index {} scored twice", index)));
        }
        *slot = Some(score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| ScorerError::InvalidResponse(format!("Rerank response missing index {}", i))))
        .collect()
}
