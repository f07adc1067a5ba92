//! In-memory backends: a vector index using cosine distance and an
//! opportunity store.
//!
//! Both are backed by collections protected by a `tokio::sync::RwLock`. They
//! are suitable for development, testing, and small corpora.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::corpus::OpportunityStore;
use crate::embedding::EmbeddingProvider;
use crate::error::{MatchError, Result};
use crate::index::{FundingFilter, IndexEntry, MmrParams, SearchHit, VectorIndex, cosine_distance};
use crate::mmr;
use crate::opportunity::Opportunity;

#[derive(Debug, Clone)]
struct StoredChunk {
    entry: IndexEntry,
    embedding: Vec<f32>,
}

/// An in-memory [`VectorIndex`] using cosine distance for search.
///
/// Chunks are kept in insertion order; ties in distance keep that order.
///
/// # Example
///
/// ```rust,ignore
/// use observo_match::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(Arc::new(embedder));
/// index.add(&entries).await?;
/// ```
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty index that embeds through `embedder`.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder, chunks: RwLock::new(Vec::new()) }
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Score every stored chunk that passes `filter` and keep the `k` closest.
    async fn nearest(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<FundingFilter>,
    ) -> Vec<SearchHit> {
        let chunks = self.chunks.read().await;
        let mut scored: Vec<SearchHit> = chunks
            .iter()
            .filter(|chunk| filter.is_none_or(|f| f.matches(chunk.entry.funding)))
            .map(|chunk| SearchHit {
                opportunity_id: chunk.entry.opportunity_id,
                text: chunk.entry.text.clone(),
                funding: chunk.entry.funding,
                distance: cosine_distance(&chunk.embedding, query),
                embedding: chunk.embedding.clone(),
            })
            .collect();

        // stable sort keeps insertion order for equal distances
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        // Embed before taking the lock so a failure leaves the index untouched.
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != entries.len() {
            return Err(MatchError::retrieval(
                self.embedder.name(),
                format!("expected {} embeddings, got {}", entries.len(), embeddings.len()),
            ));
        }

        let mut chunks = self.chunks.write().await;
        chunks.extend(
            entries
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(entry, embedding)| StoredChunk { entry, embedding }),
        );
        debug!(added = entries.len(), total = chunks.len(), "added chunks to in-memory index");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<FundingFilter>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed_query(query).await?;
        Ok(self.nearest(&embedding, k, filter).await)
    }

    async fn search_mmr(
        &self,
        query: &str,
        params: MmrParams,
        filter: Option<FundingFilter>,
    ) -> Result<Vec<SearchHit>> {
        if params.k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed_query(query).await?;
        let candidates = self.nearest(&embedding, params.fetch_k.max(params.k), filter).await;
        Ok(mmr::select(&embedding, candidates, params.k, params.lambda))
    }
}

/// An in-memory [`OpportunityStore`] keyed by opportunity id.
///
/// `insert` and `remove` stand in for the bulk import and administrative
/// deletion that own the relational corpus in production.
#[derive(Debug, Default)]
pub struct InMemoryOpportunityStore {
    records: RwLock<BTreeMap<Uuid, Opportunity>>,
}

impl InMemoryOpportunityStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, opportunity: Opportunity) {
        self.records.write().await.insert(opportunity.id, opportunity);
    }

    /// Delete a record; the index is not touched.
    pub async fn remove(&self, id: Uuid) -> Option<Opportunity> {
        self.records.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn filter_by_flag(&self, vectorized: bool) -> Vec<Opportunity> {
        self.records.read().await.values().filter(|o| o.vectorized == vectorized).cloned().collect()
    }
}

#[async_trait]
impl OpportunityStore for InMemoryOpportunityStore {
    async fn get(&self, id: Uuid) -> Result<Option<Opportunity>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn pending(&self) -> Result<Vec<Opportunity>> {
        Ok(self.filter_by_flag(false).await)
    }

    async fn vectorized(&self) -> Result<Vec<Opportunity>> {
        Ok(self.filter_by_flag(true).await)
    }

    async fn mark_vectorized(&self, ids: &[Uuid]) -> Result<()> {
        let mut records = self.records.write().await;
        for id in ids {
            if let Some(record) = records.get_mut(id) {
                record.vectorized = true;
            }
        }
        Ok(())
    }
}
