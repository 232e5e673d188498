/// Crate-level error types for brew-oracle
///
/// Backend and reranker failures are absorbed inside the search pipeline;
/// only the conditions below ever reach a caller of `SearchOrchestrator`.

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Every configured backend failed or timed out for this query.
    #[error("No backends available: all {attempted} backend(s) failed")]
    NoBackendsAvailable {
        attempted: usize,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
        field: Option<String>,
    },

    /// The caller abandoned the query before it was delivered.
    #[error("Search cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::embedding::EmbeddingError> for OracleError {
    fn from(e: crate::embedding::EmbeddingError) -> Self {
        OracleError::Internal(e.to_string())
    }
}

impl From<crate::rerank::ScorerError> for OracleError {
    fn from(e: crate::rerank::ScorerError) -> Self {
        OracleError::Internal(e.to_string())
    }
}

impl OracleError {
    /// Helper to create configuration errors with field names
    ///
    /// Example:
    /// ```
    /// use brew_oracle::errors::OracleError;
    /// let err = OracleError::invalid_config("retrieval.top_k", "top_k must be greater than zero");
    /// ```
    pub fn invalid_config(field: &str, message: &str) -> Self {
        OracleError::InvalidConfiguration {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_carries_field() {
        let err = OracleError::invalid_config("retrieval.top_k", "top_k must be greater than zero");
        match &err {
            OracleError::InvalidConfiguration { field, .. } => {
                assert_eq!(field.as_deref(), Some("retrieval.top_k"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "Invalid configuration: top_k must be greater than zero"
        );
    }

    #[test]
    fn test_no_backends_message() {
        let err = OracleError::NoBackendsAvailable { attempted: 2 };
        assert_eq!(err.to_string(), "No backends available: all 2 backend(s) failed");
    }
}
