/// Payload → Candidate mapping
///
/// Index payloads name the same concept in several ways (`source`,
/// `file_path`, `name`; `page`, `page_number`) and nest metadata under
/// `meta_data` or `metadata`. This module resolves all of that exactly once,
/// at the adapter boundary, into the canonical keys in `search::meta`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::search::{meta, Candidate, MetaValue, Metadata};

/// Keys holding the candidate text, in lookup order.
const CONTENT_KEYS: &[&str] = &["content", "full_text", "text"];
/// Keys holding nested metadata objects.
const NESTED_KEYS: &[&str] = &["meta_data", "metadata"];
/// Top-level keys that are bookkeeping, not provenance.
const IGNORED_KEYS: &[&str] = &["usage", "content_hash", "content_id"];
const SOURCE_ALIASES: &[&str] = &["source", "file_path", "file_name", "name"];
const PAGE_ALIASES: &[&str] = &["page", "page_number"];

/// Which corpus an index holds; decides how provenance is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusKind {
    /// Chunked PDF documents
    Documents,
    /// Structured BeerXML recipe records
    Recipes,
}

impl CorpusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusKind::Documents => "documents",
            CorpusKind::Recipes => "recipes",
        }
    }
}

/// Build a candidate from one index hit.
pub fn to_candidate(kind: CorpusKind, backend: &str, id: String, score: f32, payload: &Map<String, Value>) -> Candidate {
    let content = CONTENT_KEYS
        .iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let mut candidate = Candidate::new(backend, id, content, score);
    candidate.metadata = metadata(kind, payload);
    candidate
}

fn metadata(kind: CorpusKind, payload: &Map<String, Value>) -> Metadata {
    // nested metadata wins over top-level fields of the same name
    let mut fields: Map<String, Value> = payload
        .iter()
        .filter(|(k, _)| {
            !CONTENT_KEYS.contains(&k.as_str())
                && !NESTED_KEYS.contains(&k.as_str())
                && !IGNORED_KEYS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for key in NESTED_KEYS {
        if let Some(Value::Object(nested)) = payload.get(*key) {
            for (k, v) in nested {
                if !CONTENT_KEYS.contains(&k.as_str()) {
                    fields.insert(k.clone(), v.clone());
                }
            }
        }
    }

    let mut out = Metadata::new();
    out.insert(meta::CORPUS.to_string(), MetaValue::from(kind.as_str()));

    let source_aliases: &[&str] = match kind {
        CorpusKind::Documents => SOURCE_ALIASES,
        CorpusKind::Recipes => &["name", "source"],
    };
    if let Some(source) = source_aliases
        .iter()
        .find_map(|k| fields.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
    {
        out.insert(meta::SOURCE.to_string(), MetaValue::from(source));
    }
    if let Some(page) = PAGE_ALIASES.iter().find_map(|k| fields.get(*k).and_then(as_page)) {
        out.insert(meta::PAGE.to_string(), MetaValue::Integer(page));
    }

    for (key, value) in &fields {
        if SOURCE_ALIASES.contains(&key.as_str()) || PAGE_ALIASES.contains(&key.as_str()) {
            continue;
        }
        if let Some(scalar) = to_scalar(value) {
            out.entry(key.clone()).or_insert(scalar);
        }
    }

    // recipes keep their name as a field too
    if kind == CorpusKind::Recipes {
        if let Some(name) = fields.get("name").and_then(Value::as_str) {
            out.insert("name".to_string(), MetaValue::from(name));
        }
    }

    out
}

fn as_page(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Scalars pass through; arrays of scalars are joined; objects and nulls are dropped.
fn to_scalar(value: &Value) -> Option<MetaValue> {
    match value {
        Value::Bool(b) => Some(MetaValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(MetaValue::Integer)
            .or_else(|| n.as_f64().map(MetaValue::Float)),
        Value::String(s) => Some(MetaValue::Text(s.clone())),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(MetaValue::Text(parts.join(", ")))
            }
        }
        Value::Null | Value::Object(_) => None,
    }
}
