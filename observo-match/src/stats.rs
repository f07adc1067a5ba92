//! Corpus statistics used to size retrieval queries.

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::chunking::Chunker;
use crate::corpus::OpportunityStore;
use crate::error::Result;

/// Cached average number of chunks per indexed opportunity.
///
/// The value is computed on first use and kept until [`refresh`](Self::refresh)
/// is called; indexing new opportunities does not invalidate it.
#[derive(Debug)]
pub struct ChunkStats {
    default_avg: f64,
    cached: RwLock<Option<f64>>,
}

impl ChunkStats {
    /// Create an empty cache that falls back to `default_avg` for an empty corpus.
    pub fn new(default_avg: f64) -> Self {
        Self { default_avg, cached: RwLock::new(None) }
    }

    /// The cached average, if one has been computed or pinned.
    pub async fn cached(&self) -> Option<f64> {
        *self.cached.read().await
    }

    /// Pin the average to `value` without looking at the corpus.
    pub async fn set(&self, value: f64) {
        *self.cached.write().await = Some(value);
    }

    /// Drop the cached value so the next call to [`average`](Self::average)
    /// recomputes it.
    pub async fn refresh(&self) {
        *self.cached.write().await = None;
    }

    /// Return the cached average, computing it from the vectorized records'
    /// descriptions if needed.
    ///
    /// The corpus is read without holding the lock, so concurrent cold calls
    /// may each compute the value; the first one stored wins.
    pub async fn average(&self, store: &dyn OpportunityStore, chunker: &dyn Chunker) -> Result<f64> {
        if let Some(avg) = self.cached().await {
            return Ok(avg);
        }

        let records = store.vectorized().await?;
        let chunk_total: usize = records.iter().map(|o| chunker.split(&o.describe()).len()).sum();
        let avg = if records.is_empty() || chunk_total == 0 {
            warn!(default = self.default_avg, "empty corpus, using default chunks per opportunity");
            self.default_avg
        } else {
            chunk_total as f64 / records.len() as f64
        };

        info!(opportunities = records.len(), chunks = chunk_total, avg, "computed chunk statistics");
        Ok(*self.cached.write().await.get_or_insert(avg))
    }
}
