//! # observo-match
//!
//! Semantic matching of prospect summaries against grant opportunities.
//!
//! ## Overview
//!
//! Every [`Opportunity`] is turned into a canonical description, split into
//! overlapping chunks by a [`Chunker`], embedded by an [`EmbeddingProvider`] and
//! stored in an add-only [`VectorIndex`]. A [`MatchOrchestrator`] then turns a
//! free-text summary into a [`Match`]: at most `n` distinct opportunities,
//! ordered by maximal marginal relevance and annotated with their best chunk
//! distance.
//!
//! - [`Indexer`]: vectorizes pending opportunities in batches
//! - [`Retriever`]: over-fetches chunks and deduplicates by opportunity
//! - [`ChunkStats`]: cached average chunks per opportunity, refreshed explicitly
//!
//! ## Feature Flags
//!
//! | Feature | Backend |
//! |---------|---------|
//! | `gemini` | [`gemini::GeminiEmbeddingProvider`] |
//! | `pgvector` | [`pgvector::PgVectorIndex`], [`postgres::PgOpportunityStore`] |
//! | `full` | All of the above |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use observo_match::*;
//!
//! let config = MatchConfig::default();
//! let store = Arc::new(InMemoryOpportunityStore::new());
//! let index = Arc::new(InMemoryVectorIndex::new(embedder));
//! let chunker = Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap));
//!
//! Indexer::new(store.clone(), index.clone(), chunker.clone(), &config)?.run().await?;
//!
//! let orchestrator = MatchOrchestrator::builder()
//!     .config(config)
//!     .store(store)
//!     .index(index)
//!     .chunker(chunker)
//!     .build()?;
//! let found = orchestrator.match_default("We run after-school STEM programs").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod inmemory;
pub mod matcher;
pub mod mmr;
pub mod opportunity;
pub mod retriever;
pub mod stats;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "pgvector")]
pub mod pgvector;

#[cfg(feature = "pgvector")]
pub mod postgres;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{MatchConfig, MatchConfigBuilder};
pub use corpus::OpportunityStore;
pub use embedding::EmbeddingProvider;
pub use error::{MatchError, Result};
pub use index::{FundingFilter, IndexEntry, MmrParams, SearchHit, VectorIndex};
pub use indexer::{IndexReport, Indexer};
pub use inmemory::{InMemoryOpportunityStore, InMemoryVectorIndex};
pub use matcher::{
    Match, MatchNotice, MatchOrchestrator, MatchOrchestratorBuilder, Proposal,
    normalize_categories,
};
pub use opportunity::Opportunity;
pub use retriever::{Candidate, Retriever};
pub use stats::ChunkStats;
