/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: brew-oracle.toml (in working directory)
/// 3. Environment variables: prefixed BREW_ORACLE_, nested keys split on "__"
///    (e.g., BREW_ORACLE_RETRIEVAL__TOP_K=10)
///
/// The resulting value is built once and handed to every component at
/// construction time; nothing else reads the environment.

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::OracleError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional file path for log output (in addition to stderr)
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub qdrant: QdrantConfig,

    /// PDF chunk collection
    #[serde(default = "default_documents")]
    pub documents: CollectionConfig,

    /// BeerXML recipe collection
    #[serde(default = "default_recipes")]
    pub recipes: CollectionConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub rerank: RerankConfig,
}

/// Connection settings shared by every Qdrant-backed collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name of the dense (embedding) vector in each collection
    #[serde(default = "default_dense_vector_name")]
    pub dense_vector_name: String,
    /// Name of the sparse (BM25) vector; None disables hybrid retrieval
    #[serde(default = "default_sparse_vector_name")]
    pub sparse_vector_name: Option<String>,
    /// Inference model Qdrant applies to sparse query text; must match the indexing model
    #[serde(default = "default_sparse_model")]
    pub sparse_model: String,
}

/// One searchable collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub collection: String,
}

/// OpenAI-compatible embeddings endpoint used to embed queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Bounds both per-backend fan-out and the final result length
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Reciprocal-rank smoothing constant
    #[serde(default = "default_rrf_offset")]
    pub rrf_offset: f64,
    /// Per-backend deadline; a backend exceeding it is treated as unavailable
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,
    /// Issue dense + sparse sub-queries and fuse them per backend
    #[serde(default)]
    pub hybrid: bool,
}

/// Cross-encoder reranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_rerank_base_url")]
    pub base_url: String,
    #[serde(default = "default_rerank_path")]
    pub path: String,
    #[serde(default = "default_rerank_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_dense_vector_name() -> String {
    "dense".to_string()
}

fn default_sparse_vector_name() -> Option<String> {
    Some("sparse".to_string())
}

fn default_sparse_model() -> String {
    crate::backend::sparse::DEFAULT_SPARSE_MODEL.to_string()
}

fn default_documents() -> CollectionConfig {
    CollectionConfig {
        enabled: true,
        collection: "brew_books".to_string(),
    }
}

fn default_recipes() -> CollectionConfig {
    CollectionConfig {
        enabled: true,
        collection: "brew_recipes".to_string(),
    }
}

fn default_embedding_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_top_k() -> usize {
    20
}

fn default_rrf_offset() -> f64 {
    60.0
}

fn default_backend_timeout_ms() -> u64 {
    5_000
}

fn default_rerank_model() -> String {
    "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string()
}

fn default_rerank_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_rerank_path() -> String {
    "/rerank".to_string()
}

fn default_rerank_timeout_ms() -> u64 {
    10_000
}

impl Default for QdrantConfig {
    fn default() -> Self {
        QdrantConfig {
            url: default_qdrant_url(),
            api_key: None,
            dense_vector_name: default_dense_vector_name(),
            sparse_vector_name: default_sparse_vector_name(),
            sparse_model: default_sparse_model(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            top_k: default_top_k(),
            rrf_offset: default_rrf_offset(),
            backend_timeout_ms: default_backend_timeout_ms(),
            hybrid: false,
        }
    }
}

impl RetrievalConfig {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        RerankConfig {
            enabled: false,
            model: default_rerank_model(),
            base_url: default_rerank_base_url(),
            path: default_rerank_path(),
            timeout_ms: default_rerank_timeout_ms(),
            api_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_file: None,
            qdrant: QdrantConfig::default(),
            documents: default_documents(),
            recipes: default_recipes(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            rerank: RerankConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: BREW_ORACLE_RERANK__ENABLED=true overrides rerank.enabled in brew-oracle.toml
    pub fn load() -> Result<Config, OracleError> {
        Self::figment()
            .extract()
            .map_err(|e| OracleError::Config(format!("Failed to load config: {}", e)))
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("brew-oracle.toml"))
            .merge(Env::prefixed("BREW_ORACLE_").split("__"))
    }

    /// Reject values that would make every query fail or misbehave.
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.retrieval.top_k == 0 {
            return Err(OracleError::invalid_config(
                "retrieval.top_k",
                "top_k must be greater than zero",
            ));
        }
        if !self.retrieval.rrf_offset.is_finite() || self.retrieval.rrf_offset <= 0.0 {
            return Err(OracleError::invalid_config(
                "retrieval.rrf_offset",
                "rrf_offset must be a positive finite number",
            ));
        }
        if self.retrieval.backend_timeout_ms == 0 {
            return Err(OracleError::invalid_config(
                "retrieval.backend_timeout_ms",
                "backend timeout must be greater than zero",
            ));
        }
        if !self.documents.enabled && !self.recipes.enabled {
            return Err(OracleError::invalid_config(
                "documents.enabled",
                "at least one backend (documents or recipes) must be enabled",
            ));
        }
        if self.retrieval.hybrid && self.qdrant.sparse_vector_name.is_none() {
            return Err(OracleError::invalid_config(
                "qdrant.sparse_vector_name",
                "hybrid retrieval requires a sparse vector name",
            ));
        }
        if self.retrieval.hybrid && self.qdrant.sparse_model.trim().is_empty() {
            return Err(OracleError::invalid_config(
                "qdrant.sparse_model",
                "hybrid retrieval requires a sparse inference model",
            ));
        }
        if self.rerank.enabled && self.rerank.timeout_ms == 0 {
            return Err(OracleError::invalid_config(
                "rerank.timeout_ms",
                "rerank timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
