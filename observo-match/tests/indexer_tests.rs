//! Indexing passes over the in-memory backends.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{FlakyEmbedder, Harness, HashEmbedder, funded};
use observo_match::{
    InMemoryOpportunityStore, InMemoryVectorIndex, Indexer, MatchConfig, MatchError, Opportunity,
    OpportunityStore, RecursiveChunker, Result,
};
use uuid::Uuid;

#[tokio::test]
async fn marks_only_records_that_produced_chunks() {
    let blank = Opportunity::new("BLANK", "");
    let blank_id = blank.id;
    let records = vec![
        funded("A", "Rural Broadband Expansion", "broadband for rural areas"),
        funded("B", "Community Solar Deployment", "solar farms"),
        blank,
    ];
    let harness = Harness::new(MatchConfig::default(), records).await;

    let report = harness.indexer().run().await.unwrap();
    assert_eq!(report.opportunities, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(harness.index.len().await, 2);

    let pending = harness.store.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, blank_id);
}

#[tokio::test]
async fn second_pass_only_adds_new_records() {
    let harness =
        Harness::new(MatchConfig::default(), vec![funded("A", "Rural Broadband", "rural")]).await;
    harness.indexer().run().await.unwrap();

    harness.store.insert(funded("B", "Community Solar", "solar")).await;
    let report = harness.indexer().run().await.unwrap();
    assert_eq!(report.opportunities, 1);
    assert_eq!(harness.index.len().await, 2);
    assert!(harness.store.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_batch_leaves_its_records_pending() {
    let config = MatchConfig::builder().index_batch_size(1).build().unwrap();
    let embedder = Arc::new(FlakyEmbedder::failing_on(2));
    let records = vec![
        funded("A", "Rural Broadband", "rural"),
        funded("B", "Community Solar", "solar"),
        funded("C", "Clean Water", "water"),
    ];
    let harness = Harness::with_embedder(config, records, embedder.clone()).await;

    let err = harness.indexer().run().await.unwrap_err();
    assert!(err.is_retrieval_unavailable());
    assert_eq!(embedder.batch_calls(), 2);

    // the first batch was added and marked, nothing after it
    assert_eq!(harness.index.len().await, 1);
    assert_eq!(harness.store.vectorized().await.unwrap().len(), 1);
    assert_eq!(harness.store.pending().await.unwrap().len(), 2);
}

#[tokio::test]
async fn long_descriptions_are_split_into_several_chunks() {
    let config = MatchConfig::builder().chunk_size(200).chunk_overlap(40).build().unwrap();
    let mut record = funded("LONG", "Watershed Restoration", "");
    record.summary = Some("Restores riparian buffers along the watershed. ".repeat(20));
    let expected = harness_chunks(&record, 200, 40);

    let harness = Harness::new(config, vec![record]).await;
    let report = harness.indexer().run().await.unwrap();
    assert_eq!(report.opportunities, 1);
    assert_eq!(report.chunks, expected);
    assert!(expected > 1);
}

fn harness_chunks(record: &Opportunity, size: usize, overlap: usize) -> usize {
    use observo_match::{Chunker, RecursiveChunker};
    RecursiveChunker::new(size, overlap).split(&record.describe()).len()
}

/// A store that loses its connection when asked to mark records.
struct UnmarkableStore(InMemoryOpportunityStore);

#[async_trait]
impl OpportunityStore for UnmarkableStore {
    async fn get(&self, id: Uuid) -> Result<Option<Opportunity>> {
        self.0.get(id).await
    }

    async fn pending(&self) -> Result<Vec<Opportunity>> {
        self.0.pending().await
    }

    async fn vectorized(&self) -> Result<Vec<Opportunity>> {
        self.0.vectorized().await
    }

    async fn mark_vectorized(&self, _ids: &[Uuid]) -> Result<()> {
        Err(MatchError::CorpusError {
            backend: "unmarkable".into(),
            message: "connection reset".into(),
        })
    }
}

#[tokio::test]
async fn failed_marking_reports_a_corpus_error() {
    let inner = InMemoryOpportunityStore::new();
    inner.insert(funded("A", "Rural Broadband", "rural")).await;
    let store = Arc::new(UnmarkableStore(inner));
    let index = Arc::new(InMemoryVectorIndex::new(Arc::new(HashEmbedder)));
    let config = MatchConfig::default();
    let chunker = Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap));

    let indexer = Indexer::new(store.clone(), index.clone(), chunker, &config).unwrap();
    let err = indexer.run().await.unwrap_err();
    assert!(matches!(err, MatchError::CorpusError { .. }));

    // the chunks are in the index but the record is still pending
    assert_eq!(index.len().await, 1);
    assert_eq!(store.pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn indexer_rejects_inconsistent_config() {
    let harness = Harness::new(MatchConfig::default(), Vec::new()).await;
    let config = MatchConfig { index_batch_size: 0, ..Default::default() };
    let result =
        Indexer::new(harness.store.clone(), harness.index.clone(), harness.chunker.clone(), &config);
    assert!(matches!(result, Err(MatchError::ConfigError(_))));
}
