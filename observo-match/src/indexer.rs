//! Batch vectorization of pending opportunities.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::chunking::Chunker;
use crate::config::MatchConfig;
use crate::corpus::OpportunityStore;
use crate::error::Result;
use crate::index::{IndexEntry, VectorIndex};

/// Summary of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Opportunities added to the index and marked vectorized.
    pub opportunities: usize,
    /// Chunks added to the index.
    pub chunks: usize,
    /// Pending opportunities left alone because their description was empty.
    pub skipped: usize,
}

/// Adds pending opportunities to the index: describe → chunk → add → mark.
///
/// Records are only marked vectorized after the `add` call carrying their
/// chunks has returned successfully, one batch of
/// [`MatchConfig::index_batch_size`] records at a time.
pub struct Indexer {
    store: Arc<dyn OpportunityStore>,
    index: Arc<dyn VectorIndex>,
    chunker: Arc<dyn Chunker>,
    batch_size: usize,
}

impl Indexer {
    /// # Errors
    ///
    /// Returns [`MatchError::ConfigError`](crate::MatchError::ConfigError) if
    /// `config` is inconsistent.
    pub fn new(
        store: Arc<dyn OpportunityStore>,
        index: Arc<dyn VectorIndex>,
        chunker: Arc<dyn Chunker>,
        config: &MatchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, index, chunker, batch_size: config.index_batch_size })
    }

    /// Index every pending opportunity.
    ///
    /// # Errors
    ///
    /// Stops at the first failing batch. Batches added before it stay marked;
    /// records of the failing batch and later ones stay pending.
    pub async fn run(&self) -> Result<IndexReport> {
        let pending = self.store.pending().await?;
        info!(pending = pending.len(), "indexing started");

        let mut report = IndexReport::default();
        let mut prepared: Vec<(Uuid, Vec<IndexEntry>)> = Vec::with_capacity(pending.len());
        for opportunity in &pending {
            let funding = opportunity.is_funded();
            let entries: Vec<IndexEntry> = self
                .chunker
                .split(&opportunity.describe())
                .into_iter()
                .map(|text| IndexEntry { opportunity_id: opportunity.id, text, funding })
                .collect();
            if entries.is_empty() {
                report.skipped += 1;
                continue;
            }
            prepared.push((opportunity.id, entries));
        }

        for batch in prepared.chunks(self.batch_size) {
            let ids: Vec<Uuid> = batch.iter().map(|(id, _)| *id).collect();
            let entries: Vec<IndexEntry> =
                batch.iter().flat_map(|(_, entries)| entries.iter().cloned()).collect();

            self.index.add(&entries).await.inspect_err(|e| {
                error!(batch = ids.len(), error = %e, "index add failed");
            })?;
            self.store.mark_vectorized(&ids).await.inspect_err(|e| {
                error!(
                    ids = ?ids,
                    error = %e,
                    "chunks added but records left pending, rerun will duplicate them"
                );
            })?;

            report.opportunities += ids.len();
            report.chunks += entries.len();
        }

        info!(
            opportunities = report.opportunities,
            chunks = report.chunks,
            skipped = report.skipped,
            "indexing completed"
        );
        Ok(report)
    }
}
