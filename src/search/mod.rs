pub mod fusion;
pub mod hybrid;
pub mod orchestrator;

// Re-export key types for convenience
pub use fusion::{FusedCandidate, RrfFusion, DEFAULT_RRF_OFFSET};
pub use hybrid::{HybridQueryPlanner, RetrievalBackend, RetrievalMode};
pub use orchestrator::{SearchOrchestrator, SearchOutcome, SearchRequest};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Canonical metadata keys populated by backend adapters.
///
/// Consumers read provenance through these keys only; adapters resolve
/// whatever their index stores into this schema once, at the boundary.
pub mod meta {
    /// Originating file name (documents) or recipe name (recipes)
    pub const SOURCE: &str = "source";
    /// 1-based page number inside the source document
    pub const PAGE: &str = "page";
    /// Which corpus produced the candidate: "documents" or "recipes"
    pub const CORPUS: &str = "corpus";
}

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::Integer(i) => write!(f, "{}", i),
            MetaValue::Float(x) => write!(f, "{}", x),
            MetaValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Integer(i)
    }
}

impl From<f64> for MetaValue {
    fn from(x: f64) -> Self {
        MetaValue::Float(x)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// String-keyed scalar metadata, ordered for deterministic output.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Identity used to deduplicate candidates across ranked lists.
///
/// Ids are only unique within one backend unless the adapter promises
/// otherwise, so the backend tag is part of the key by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum CandidateKey {
    Backend { backend: String, id: String },
    Global { id: String },
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKey::Backend { backend, id } => write!(f, "{}:{}", backend, id),
            CandidateKey::Global { id } => write!(f, "{}", id),
        }
    }
}

/// One unit of retrieved evidence: a text chunk or a structured record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Tag of the backend that produced this candidate
    pub backend: String,
    /// Backend-local identifier
    pub id: String,
    /// Text shown to the generator and scored by the reranker
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Backend-local relevance score; not comparable across backends
    pub score: f32,
    /// Set by adapters whose ids are unique across every backend
    #[serde(default)]
    pub globally_unique: bool,
}

impl Candidate {
    pub fn new(backend: impl Into<String>, id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Candidate {
            backend: backend.into(),
            id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
            score,
            globally_unique: false,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn key(&self) -> CandidateKey {
        if self.globally_unique {
            CandidateKey::Global { id: self.id.clone() }
        } else {
            CandidateKey::Backend {
                backend: self.backend.clone(),
                id: self.id.clone(),
            }
        }
    }

    pub fn source(&self) -> Option<String> {
        self.metadata.get(meta::SOURCE).map(|v| v.to_string())
    }

    pub fn page(&self) -> Option<i64> {
        match self.metadata.get(meta::PAGE) {
            Some(MetaValue::Integer(p)) => Some(*p),
            _ => None,
        }
    }
}

/// Ranked output of exactly one backend for exactly one query.
///
/// Position is the 0-based rank; keys are unique within the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedList {
    backend: String,
    candidates: Vec<Candidate>,
}

impl RankedList {
    /// Build a list from best-first candidates, keeping the first occurrence of any repeated key.
    pub fn new(backend: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        let backend = backend.into();
        let mut seen = HashSet::with_capacity(candidates.len());
        let before = candidates.len();
        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.key()))
            .collect();
        if candidates.len() < before {
            tracing::debug!(
                backend = %backend,
                dropped = before - candidates.len(),
                "Removed repeated candidates from ranked list"
            );
        }
        RankedList { backend, candidates }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.candidates.truncate(len);
    }
}

/// A delivered search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub candidate: Candidate,
    /// Rank-derived fusion score; only meaningful for ordering
    pub fusion_score: f64,
    /// Cross-encoder score, present when reranking ran for this query
    pub rerank_score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_list_drops_repeated_ids() {
        let list = RankedList::new(
            "documents",
            vec![
                Candidate::new("documents", "a", "first", 0.9),
                Candidate::new("documents", "b", "second", 0.8),
                Candidate::new("documents", "a", "again", 0.7),
            ],
        );
        let ids: Vec<&str> = list.candidates().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(list.candidates()[0].content, "first");
    }

    #[test]
    fn test_key_scoped_by_backend() {
        let doc = Candidate::new("documents", "1", "x", 0.1);
        let recipe = Candidate::new("recipes", "1", "y", 0.1);
        assert_ne!(doc.key(), recipe.key());

        let mut a = doc.clone();
        let mut b = recipe.clone();
        a.globally_unique = true;
        b.globally_unique = true;
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_provenance_accessors() {
        let c = Candidate::new("documents", "7", "mash at 67C", 0.5)
            .with_meta(meta::SOURCE, "brewing_basics.pdf")
            .with_meta(meta::PAGE, 12i64);
        assert_eq!(c.source().as_deref(), Some("brewing_basics.pdf"));
        assert_eq!(c.page(), Some(12));

        let bare = Candidate::new("recipes", "8", "IPA", 0.5);
        assert_eq!(bare.source(), None);
        assert_eq!(bare.page(), None);
    }

    #[test]
    fn test_meta_value_untagged_json() {
        let mut m = Metadata::new();
        m.insert("abv".into(), MetaValue::Float(6.5));
        m.insert("page".into(), MetaValue::Integer(3));
        m.insert("style".into(), MetaValue::from("American IPA"));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json, serde_json::json!({"abv": 6.5, "page": 3, "style": "American IPA"}));
    }
}
