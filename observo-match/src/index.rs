//! The add-only vector index of opportunity chunks.
//!
//! An index owns its [`EmbeddingProvider`](crate::EmbeddingProvider): callers
//! hand it text and get text back. There is no update or delete
//! path; correcting the vectors of a changed or deleted opportunity requires
//! rebuilding the index from scratch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A chunk of an opportunity description, ready to be embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The opportunity the chunk was cut from.
    pub opportunity_id: Uuid,
    /// The chunk text.
    pub text: String,
    /// Whether the opportunity advertises funding.
    pub funding: bool,
}

/// Exact-match restriction on the stored `funding` flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FundingFilter {
    pub funding: bool,
}

impl FundingFilter {
    /// Only chunks of funded opportunities.
    pub const FUNDED: Self = Self { funding: true };

    pub fn matches(&self, funding: bool) -> bool {
        self.funding == funding
    }
}

/// One stored chunk returned by a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub opportunity_id: Uuid,
    pub text: String,
    pub funding: bool,
    /// Distance to the query (lower is closer). Only comparable with other
    /// distances from the same index.
    pub distance: f32,
    /// The stored vector, when the backend returned it.
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// Parameters of a maximal-marginal-relevance search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrParams {
    /// Number of hits to select.
    pub k: usize,
    /// Size of the nearest-neighbor candidate pool to select from.
    pub fetch_k: usize,
    /// Relevance/diversity trade-off in `[0, 1]`; 1.0 is plain similarity.
    pub lambda: f32,
}

/// A storage backend for opportunity chunk embeddings.
///
/// # Example
///
/// ```rust,ignore
/// use observo_match::{InMemoryVectorIndex, VectorIndex, FundingFilter};
///
/// let index = InMemoryVectorIndex::new(Arc::new(embedder));
/// index.add(&entries).await?;
/// let hits = index.search("solar microgrid", 10, Some(FundingFilter::FUNDED)).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and store every entry.
    ///
    /// Either all entries are stored or, on error, none are.
    async fn add(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Return the `k` stored chunks closest to `query`, by ascending distance.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<FundingFilter>,
    ) -> Result<Vec<SearchHit>>;

    /// Return up to `params.k` chunks chosen by maximal marginal relevance from
    /// the `params.fetch_k` closest chunks, in selection order.
    async fn search_mmr(
        &self,
        query: &str,
        params: MmrParams,
        filter: Option<FundingFilter>,
    ) -> Result<Vec<SearchHit>>;
}

/// Cosine similarity of two vectors; 0.0 if either has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine distance, matching pgvector's `<=>` operator.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
