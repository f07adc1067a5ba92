//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use observo_match::{
    EmbeddingProvider, InMemoryOpportunityStore, InMemoryVectorIndex, Indexer, MatchConfig,
    MatchError, MatchOrchestrator, Opportunity, RecursiveChunker, Result,
};

pub const DIM: usize = 256;

/// Deterministic bag-of-words embedder: each lowercase token is hashed (FNV-1a)
/// onto one of `DIM` axes and the vector is L2-normalized. Identical texts get
/// identical vectors; texts sharing vocabulary land close together.
#[derive(Debug, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            v[(hash % DIM as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Fails every call, as an unreachable embedding service would.
#[derive(Debug, Default)]
pub struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MatchError::RetrievalUnavailable {
            backend: "unavailable".into(),
            message: "connection refused".into(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Embeds like [`HashEmbedder`] but fails the batch call number `fail_on`
/// (1-based) and every call after it.
#[derive(Debug)]
pub struct FlakyEmbedder {
    calls: AtomicUsize,
    fail_on: usize,
}

impl FlakyEmbedder {
    pub fn failing_on(fail_on: usize) -> Self {
        Self { calls: AtomicUsize::new(0), fail_on }
    }

    pub fn batch_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(HashEmbedder::vector(text))
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_on {
            return Err(MatchError::RetrievalUnavailable {
                backend: "flaky".into(),
                message: format!("batch {call} rejected"),
            });
        }
        Ok(texts.iter().map(|t| HashEmbedder::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

pub fn funded(identifier: &str, title: &str, summary: &str) -> Opportunity {
    let mut opportunity = Opportunity::new(identifier, title);
    opportunity.summary = Some(summary.to_string());
    opportunity.funding = Some(250_000);
    opportunity
}

/// A store, an index and an orchestrator wired together over the given records.
pub struct Harness {
    pub config: MatchConfig,
    pub store: Arc<InMemoryOpportunityStore>,
    pub index: Arc<InMemoryVectorIndex>,
    pub chunker: Arc<RecursiveChunker>,
    pub orchestrator: MatchOrchestrator,
}

impl Harness {
    pub async fn new(config: MatchConfig, records: Vec<Opportunity>) -> Self {
        Self::with_embedder(config, records, Arc::new(HashEmbedder)).await
    }

    pub async fn with_embedder(
        config: MatchConfig,
        records: Vec<Opportunity>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let store = Arc::new(InMemoryOpportunityStore::new());
        for record in records {
            store.insert(record).await;
        }
        let index = Arc::new(InMemoryVectorIndex::new(embedder));
        let chunker = Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap));
        let orchestrator = MatchOrchestrator::builder()
            .config(config.clone())
            .store(store.clone())
            .index(index.clone())
            .chunker(chunker.clone())
            .build()
            .expect("valid orchestrator");
        Self { config, store, index, chunker, orchestrator }
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.store.clone(), self.index.clone(), self.chunker.clone(), &self.config)
            .expect("valid indexer config")
    }
}
