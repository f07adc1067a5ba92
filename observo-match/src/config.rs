//! Configuration for indexing and matching.

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Tuning parameters shared by the indexer, the retriever and the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of opportunities embedded and added per index call.
    pub index_batch_size: usize,
    /// Multiplier applied to `unique_count * avg_chunks` when sizing a query.
    pub overfetch_factor: f64,
    /// Lower bound on the number of chunks requested per query.
    pub min_fetch: usize,
    /// Upper bound on the number of chunks requested per query.
    pub max_fetch: usize,
    /// MMR candidate pool size as a multiple of the requested `k`.
    pub mmr_fetch_multiplier: usize,
    /// MMR trade-off between relevance (1.0) and diversity (0.0).
    pub mmr_lambda: f32,
    /// Average chunks per opportunity assumed when the corpus is empty.
    pub default_avg_chunks: f64,
    /// Category labels longer than this many characters are dropped.
    pub category_limit: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 150,
            index_batch_size: 100,
            overfetch_factor: 2.0,
            min_fetch: 50,
            max_fetch: 200,
            mmr_fetch_multiplier: 2,
            mmr_lambda: 0.5,
            default_avg_chunks: 4.0,
            category_limit: 40,
        }
    }
}

impl MatchConfig {
    /// Create a new builder for constructing a [`MatchConfig`].
    pub fn builder() -> MatchConfigBuilder {
        MatchConfigBuilder::default()
    }

    /// Number of chunks to request from the index for `unique_count` distinct
    /// opportunities, given the corpus average chunk count.
    pub fn fetch_k(&self, unique_count: usize, avg_chunks: f64) -> usize {
        let wanted = (unique_count as f64 * avg_chunks * self.overfetch_factor).ceil();
        let wanted = if wanted.is_finite() && wanted > 0.0 { wanted as usize } else { 0 };
        wanted.max(self.min_fetch).min(self.max_fetch)
    }

    /// Check that the parameters are consistent.
    ///
    /// Configs that bypass [`MatchConfigBuilder`] (struct literals,
    /// deserialized files) are checked again wherever they are consumed.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `index_batch_size == 0`
    /// - `min_fetch == 0` or `min_fetch > max_fetch`
    /// - `overfetch_factor` or `default_avg_chunks` is not a positive number
    /// - `mmr_fetch_multiplier == 0` or `mmr_lambda` is outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(MatchError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(MatchError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.index_batch_size == 0 {
            return Err(MatchError::ConfigError(
                "index_batch_size must be greater than zero".into(),
            ));
        }
        if self.min_fetch == 0 || self.min_fetch > self.max_fetch {
            return Err(MatchError::ConfigError(format!(
                "fetch bounds must satisfy 0 < min ({}) <= max ({})",
                self.min_fetch, self.max_fetch
            )));
        }
        if !(self.overfetch_factor.is_finite() && self.overfetch_factor > 0.0) {
            return Err(MatchError::ConfigError("overfetch_factor must be positive".into()));
        }
        if !(self.default_avg_chunks.is_finite() && self.default_avg_chunks > 0.0) {
            return Err(MatchError::ConfigError("default_avg_chunks must be positive".into()));
        }
        if self.mmr_fetch_multiplier == 0 {
            return Err(MatchError::ConfigError(
                "mmr_fetch_multiplier must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(MatchError::ConfigError(format!(
                "mmr_lambda ({}) must be within [0, 1]",
                self.mmr_lambda
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`MatchConfig`].
#[derive(Debug, Clone, Default)]
pub struct MatchConfigBuilder {
    config: MatchConfig,
}

impl MatchConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set how many opportunities are added to the index per call.
    pub fn index_batch_size(mut self, size: usize) -> Self {
        self.config.index_batch_size = size;
        self
    }

    /// Set the over-fetch multiplier.
    pub fn overfetch_factor(mut self, factor: f64) -> Self {
        self.config.overfetch_factor = factor;
        self
    }

    /// Set the bounds on the number of chunks requested per query.
    pub fn fetch_bounds(mut self, min: usize, max: usize) -> Self {
        self.config.min_fetch = min;
        self.config.max_fetch = max;
        self
    }

    /// Set the MMR candidate pool multiplier.
    pub fn mmr_fetch_multiplier(mut self, multiplier: usize) -> Self {
        self.config.mmr_fetch_multiplier = multiplier;
        self
    }

    /// Set the MMR relevance/diversity trade-off.
    pub fn mmr_lambda(mut self, lambda: f32) -> Self {
        self.config.mmr_lambda = lambda;
        self
    }

    /// Set the average chunk count assumed for an empty corpus.
    pub fn default_avg_chunks(mut self, avg: f64) -> Self {
        self.config.default_avg_chunks = avg;
        self
    }

    /// Set the maximum category label length.
    pub fn category_limit(mut self, limit: usize) -> Self {
        self.config.category_limit = limit;
        self
    }

    /// Build the [`MatchConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`MatchConfig::validate`].
    pub fn build(self) -> Result<MatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
