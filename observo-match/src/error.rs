//! Error types for the `observo-match` crate.

use thiserror::Error;

/// Errors that can abort an indexing pass or a match request.
///
/// Conditions that a match recovers from locally (a stale index entry, too few
/// distinct opportunities) are not errors; they are reported as
/// [`MatchNotice`](crate::matcher::MatchNotice)s on the returned match.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The embedding service or the vector index could not serve the request.
    #[error("Retrieval unavailable ({backend}): {message}")]
    RetrievalUnavailable {
        /// The embedding provider or index backend that failed.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The relational opportunity store failed.
    #[error("Corpus store error ({backend}): {message}")]
    CorpusError {
        /// The store backend that failed.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MatchError {
    pub(crate) fn retrieval(backend: &str, message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn corpus(backend: &str, message: impl Into<String>) -> Self {
        Self::CorpusError { backend: backend.to_string(), message: message.into() }
    }

    /// Whether the failure came from the embedding service or the index.
    pub fn is_retrieval_unavailable(&self) -> bool {
        matches!(self, Self::RetrievalUnavailable { .. })
    }
}

/// A convenience result type for matching operations.
pub type Result<T> = std::result::Result<T, MatchError>;
