//! Match orchestration.
//!
//! The [`MatchOrchestrator`] turns a prospect's free-text summary into a
//! [`Match`]: a bounded list of distinct opportunities with the figures shown
//! to the prospect.
//!
//! # Example
//!
//! ```rust,ignore
//! use observo_match::{MatchConfig, MatchOrchestrator};
//!
//! let orchestrator = MatchOrchestrator::builder()
//!     .config(MatchConfig::default())
//!     .store(store)
//!     .index(index)
//!     .build()?;
//!
//! let found = orchestrator.match_summary(&website_summary, true, 3).await?;
//! for proposal in &found.proposals {
//!     println!("{} ({:.3})", proposal.title, proposal.distance);
//! }
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::MatchConfig;
use crate::corpus::OpportunityStore;
use crate::error::{MatchError, Result};
use crate::index::{FundingFilter, VectorIndex};
use crate::opportunity::Opportunity;
use crate::retriever::{Candidate, Retriever};
use crate::stats::ChunkStats;

/// One matched opportunity as presented to the prospect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub opportunity_id: Uuid,
    pub title: String,
    pub funding_ceiling: Option<u64>,
    /// Closing date of the opportunity.
    pub deadline: Option<NaiveDate>,
    /// Normalized category labels.
    pub categories: Vec<String>,
    pub applications: Option<u32>,
    pub success_rate: Option<f64>,
    /// Best chunk distance for this opportunity (lower is closer).
    pub distance: f32,
}

/// A non-fatal condition encountered while building a [`Match`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchNotice {
    /// The index returned an opportunity that is no longer in the corpus.
    PartialCorpusMismatch { opportunity_id: Uuid },
    /// Fewer distinct opportunities were found than requested.
    InsufficientMatches { requested: usize, found: usize },
}

/// The result of matching one summary against the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub summary: String,
    /// Whether only funded opportunities were considered.
    pub funding_only: bool,
    /// Number of distinct opportunities asked for.
    pub requested: usize,
    /// Distinct opportunities, best first.
    pub proposals: Vec<Proposal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<MatchNotice>,
}

impl Match {
    /// Whether fewer proposals than requested were found.
    pub fn is_short(&self) -> bool {
        self.proposals.len() < self.requested
    }
}

/// Replace underscores with spaces and drop labels longer than `limit`
/// characters or left empty.
pub fn normalize_categories(categories: &[String], limit: usize) -> Vec<String> {
    categories
        .iter()
        .map(|c| c.replace('_', " ").trim().to_string())
        .filter(|c| !c.is_empty() && c.chars().count() <= limit)
        .collect()
}

/// Coordinates retrieval and corpus lookups for match requests.
///
/// Construct one via [`MatchOrchestrator::builder()`]. The orchestrator owns the
/// [`ChunkStats`] used to size queries; call
/// [`refresh_stats`](Self::refresh_stats) after large indexing passes.
pub struct MatchOrchestrator {
    config: MatchConfig,
    store: Arc<dyn OpportunityStore>,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
    stats: ChunkStats,
}

impl MatchOrchestrator {
    /// Create a new [`MatchOrchestratorBuilder`].
    pub fn builder() -> MatchOrchestratorBuilder {
        MatchOrchestratorBuilder::default()
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn stats(&self) -> &ChunkStats {
        &self.stats
    }

    /// Forget the cached chunk statistics; they are recomputed on the next match.
    pub async fn refresh_stats(&self) {
        self.stats.refresh().await;
    }

    /// Current average chunks per opportunity, computing it if needed.
    pub async fn avg_chunks(&self) -> Result<f64> {
        self.stats.average(self.store.as_ref(), self.chunker.as_ref()).await
    }

    /// Match with the defaults used by the intake workflows: funded
    /// opportunities only, three proposals.
    pub async fn match_default(&self, summary: &str) -> Result<Match> {
        self.match_summary(summary, true, 3).await
    }

    /// Match `summary` against the corpus.
    ///
    /// Returns at most `unique_count` distinct proposals. Ids the index returns
    /// but the store no longer holds are skipped and reported as
    /// [`MatchNotice::PartialCorpusMismatch`]; a short result is reported as
    /// [`MatchNotice::InsufficientMatches`]. Neither is an error.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::RetrievalUnavailable`] if the embedding service or
    /// the index fails, and [`MatchError::CorpusError`] if the store does.
    pub async fn match_summary(
        &self,
        summary: &str,
        funding_filter: bool,
        unique_count: usize,
    ) -> Result<Match> {
        let head: Vec<&str> = summary.split_whitespace().take(10).collect();
        info!(summary = %head.join(" "), funding_filter, unique_count, "matching started");

        let filter = funding_filter.then_some(FundingFilter::FUNDED);
        let avg_chunks = self.avg_chunks().await?;
        let candidates = self.retriever.retrieve(summary, unique_count, filter, avg_chunks).await?;

        let mut proposals = Vec::with_capacity(candidates.len());
        let mut notices = Vec::new();
        for candidate in candidates {
            match self.store.get(candidate.opportunity_id).await? {
                Some(opportunity) => proposals.push(self.proposal(&opportunity, candidate)),
                None => {
                    warn!(
                        opportunity.id = %candidate.opportunity_id,
                        "indexed opportunity missing from corpus, skipping"
                    );
                    notices.push(MatchNotice::PartialCorpusMismatch {
                        opportunity_id: candidate.opportunity_id,
                    });
                }
            }
        }

        if proposals.len() < unique_count {
            notices.push(MatchNotice::InsufficientMatches {
                requested: unique_count,
                found: proposals.len(),
            });
        }

        info!(proposals = proposals.len(), requested = unique_count, "matching completed");

        Ok(Match {
            summary: summary.to_string(),
            funding_only: funding_filter,
            requested: unique_count,
            proposals,
            notices,
        })
    }

    fn proposal(&self, opportunity: &Opportunity, candidate: Candidate) -> Proposal {
        Proposal {
            opportunity_id: opportunity.id,
            title: opportunity.title.clone(),
            funding_ceiling: opportunity.funding,
            deadline: opportunity.closed,
            categories: normalize_categories(&opportunity.categories, self.config.category_limit),
            applications: opportunity.applications,
            success_rate: opportunity.success_rate(),
            distance: candidate.distance,
        }
    }
}

/// Builder for constructing a [`MatchOrchestrator`].
///
/// `store` and `index` are required. The configuration defaults to
/// [`MatchConfig::default()`] and the chunker to a [`RecursiveChunker`] built
/// from it; supply the same chunker the index was built with.
#[derive(Default)]
pub struct MatchOrchestratorBuilder {
    config: Option<MatchConfig>,
    store: Option<Arc<dyn OpportunityStore>>,
    index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl MatchOrchestratorBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: MatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the opportunity store.
    pub fn store(mut self, store: Arc<dyn OpportunityStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the vector index.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the chunker used to estimate chunks per opportunity.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`MatchOrchestrator`].
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::ConfigError`] if the store or the index is missing
    /// or the configuration is inconsistent.
    pub fn build(self) -> Result<MatchOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let store =
            self.store.ok_or_else(|| MatchError::ConfigError("store is required".to_string()))?;
        let index =
            self.index.ok_or_else(|| MatchError::ConfigError("index is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(MatchOrchestrator {
            stats: ChunkStats::new(config.default_avg_chunks),
            retriever: Retriever::new(index, config.clone()),
            config,
            store,
            chunker,
        })
    }
}
