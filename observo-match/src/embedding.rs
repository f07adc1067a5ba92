//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Retrieval models often embed the stored passages and the incoming query
/// differently, so the two directions are separate methods. The default
/// [`embed_documents`](EmbeddingProvider::embed_documents) implementation calls
/// [`embed_query`](EmbeddingProvider::embed_query) sequentially; backends that
/// support native batching should override it.
///
/// Failures must be reported as
/// [`MatchError::RetrievalUnavailable`](crate::MatchError::RetrievalUnavailable).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of passages to be stored.
    ///
    /// Returns exactly one vector per input, in input order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_query(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short backend name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}
