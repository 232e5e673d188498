/// Sparse (BM25) query for Qdrant server-side inference
///
/// The collections are indexed with the `Qdrant/bm25` model, so the query has
/// to be tokenized, stemmed and hashed exactly the same way. Instead of
/// re-deriving that vocabulary here, the raw text is sent as a document and
/// Qdrant encodes it with the named model.

use serde::Serialize;

/// Model that produced the indexed sparse vectors.
pub const DEFAULT_SPARSE_MODEL: &str = "qdrant/bm25";

/// `{"text", "model"}` query object in Qdrant's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparseDocument<'a> {
    pub text: &'a str,
    pub model: &'a str,
}

impl<'a> SparseDocument<'a> {
    /// None for blank queries, which cannot match any term.
    pub fn new(text: &'a str, model: &'a str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(SparseDocument { text, model })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_wire_shape() {
        let doc = SparseDocument::new("  bittering hops ", DEFAULT_SPARSE_MODEL).unwrap();
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({ "text": "bittering hops", "model": "qdrant/bm25" })
        );
    }

    #[test]
    fn test_blank_query_has_no_document() {
        assert!(SparseDocument::new("", DEFAULT_SPARSE_MODEL).is_none());
        assert!(SparseDocument::new(" \n\t", DEFAULT_SPARSE_MODEL).is_none());
    }

    #[test]
    fn test_default_model_matches_indexing_model() {
        // collections are written with fastembed "Qdrant/bm25"; Qdrant names it in lowercase
        assert_eq!(DEFAULT_SPARSE_MODEL, "Qdrant/bm25".to_lowercase());
    }
}
