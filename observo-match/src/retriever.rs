//! Opportunity-level retrieval over a chunk index.
//!
//! Long descriptions are split into several chunks, so asking the index for
//! `n` chunks rarely yields `n` distinct opportunities. The retriever
//! over-fetches, orders by maximal marginal relevance, deduplicates by
//! opportunity and attaches each opportunity's best distance from a separate
//! plain similarity query.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::error::Result;
use crate::index::{FundingFilter, MmrParams, SearchHit, VectorIndex};

/// One distinct opportunity returned by the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub opportunity_id: Uuid,
    /// Lowest distance over every chunk of this opportunity seen for the query.
    pub distance: f32,
}

/// Resolves a query into distinct opportunity ids.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    config: MatchConfig,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, config: MatchConfig) -> Self {
        Self { index, config }
    }

    /// Return at most `unique_count` distinct opportunities for `query`, in
    /// first-seen MMR order.
    ///
    /// `avg_chunks` is the corpus average number of chunks per opportunity and
    /// sizes the over-fetch. A single round trip is made; when the index cannot
    /// supply enough distinct opportunities the shorter list is returned.
    ///
    /// # Errors
    ///
    /// Propagates [`MatchError::RetrievalUnavailable`](crate::MatchError::RetrievalUnavailable)
    /// from the index.
    pub async fn retrieve(
        &self,
        query: &str,
        unique_count: usize,
        filter: Option<FundingFilter>,
        avg_chunks: f64,
    ) -> Result<Vec<Candidate>> {
        if unique_count == 0 {
            return Ok(Vec::new());
        }

        let k = self.config.fetch_k(unique_count, avg_chunks);
        let params = MmrParams {
            k,
            fetch_k: k.saturating_mul(self.config.mmr_fetch_multiplier),
            lambda: self.config.mmr_lambda,
        };

        let diverse = self.index.search_mmr(query, params, filter).await?;
        let ids = dedup_in_order(&diverse, unique_count);

        let nearest = self.index.search(query, k, filter).await?;
        let best = best_distances(diverse.iter().chain(nearest.iter()));

        debug!(
            k,
            mmr_hits = diverse.len(),
            similarity_hits = nearest.len(),
            unique = ids.len(),
            requested = unique_count,
            "retrieved candidates"
        );

        Ok(ids
            .into_iter()
            .map(|id| Candidate {
                opportunity_id: id,
                distance: best.get(&id).copied().unwrap_or(f32::INFINITY),
            })
            .collect())
    }
}

/// Distinct opportunity ids in first-seen order, truncated to `limit`.
fn dedup_in_order(hits: &[SearchHit], limit: usize) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    hits.iter()
        .map(|hit| hit.opportunity_id)
        .filter(|id| seen.insert(*id))
        .take(limit)
        .collect()
}

/// Minimum distance per opportunity across all given hits.
fn best_distances<'a>(hits: impl Iterator<Item = &'a SearchHit>) -> HashMap<Uuid, f32> {
    let mut best: HashMap<Uuid, f32> = HashMap::new();
    for hit in hits {
        best.entry(hit.opportunity_id)
            .and_modify(|d| *d = d.min(hit.distance))
            .or_insert(hit.distance);
    }
    best
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    fn hit(id: Uuid, distance: f32) -> SearchHit {
        SearchHit { opportunity_id: id, text: String::new(), funding: true, distance, embedding: vec![] }
    }

    /// Replays canned results and records the requested sizes.
    struct ScriptedIndex {
        mmr: Vec<SearchHit>,
        similar: Vec<SearchHit>,
        calls: Mutex<Vec<(&'static str, usize)>>,
    }

    #[async_trait]
    impl VectorIndex for ScriptedIndex {
        async fn add(&self, _entries: &[crate::index::IndexEntry]) -> Result<()> {
            Ok(())
        }

        async fn search(
            &self,
            _query: &str,
            k: usize,
            _filter: Option<FundingFilter>,
        ) -> Result<Vec<SearchHit>> {
            self.calls.lock().unwrap().push(("search", k));
            Ok(self.similar.iter().take(k).cloned().collect())
        }

        async fn search_mmr(
            &self,
            _query: &str,
            params: MmrParams,
            _filter: Option<FundingFilter>,
        ) -> Result<Vec<SearchHit>> {
            self.calls.lock().unwrap().push(("mmr", params.k));
            Ok(self.mmr.iter().take(params.k).cloned().collect())
        }
    }

    #[tokio::test]
    async fn dedups_in_first_seen_order_and_truncates() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let index = Arc::new(ScriptedIndex {
            mmr: vec![hit(b, 0.3), hit(b, 0.2), hit(a, 0.1), hit(c, 0.5), hit(d, 0.6)],
            similar: vec![hit(a, 0.1), hit(b, 0.15), hit(c, 0.4)],
            calls: Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(index.clone(), MatchConfig::default());

        let found = retriever.retrieve("q", 3, None, 4.0).await.unwrap();
        let ids: Vec<Uuid> = found.iter().map(|c| c.opportunity_id).collect();
        assert_eq!(ids, vec![b, a, c]);
        assert_eq!(found[0].distance, 0.15);
        assert_eq!(found[1].distance, 0.1);
        assert_eq!(found[2].distance, 0.4);

        // 3 * 4 * 2 = 24 is raised to the 50 floor for both queries
        assert_eq!(*index.calls.lock().unwrap(), vec![("mmr", 50), ("search", 50)]);
    }

    #[tokio::test]
    async fn single_opportunity_returns_one_result() {
        let only = Uuid::new_v4();
        let index = Arc::new(ScriptedIndex {
            mmr: (0..10).map(|i| hit(only, i as f32 / 10.0)).collect(),
            similar: (0..10).map(|i| hit(only, i as f32 / 10.0)).collect(),
            calls: Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(index.clone(), MatchConfig::default());

        let found = retriever.retrieve("q", 3, Some(FundingFilter::FUNDED), 4.0).await.unwrap();
        assert_eq!(found, vec![Candidate { opportunity_id: only, distance: 0.0 }]);
        assert_eq!(index.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_requested_skips_the_index() {
        let index = Arc::new(ScriptedIndex {
            mmr: vec![hit(Uuid::new_v4(), 0.1)],
            similar: vec![],
            calls: Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(index.clone(), MatchConfig::default());
        assert!(retriever.retrieve("q", 0, None, 4.0).await.unwrap().is_empty());
        assert!(index.calls.lock().unwrap().is_empty());
    }
}
