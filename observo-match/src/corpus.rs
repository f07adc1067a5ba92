//! Read access to the relational opportunity corpus.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::opportunity::Opportunity;

/// The relational store that owns [`Opportunity`] records.
///
/// The matching core only reads records and flips the `vectorized` flag after
/// a successful indexing batch. Records are created, updated and deleted by
/// external collaborators (bulk import, administration).
#[async_trait]
pub trait OpportunityStore: Send + Sync {
    /// Look up a record by id; `None` if it no longer exists.
    async fn get(&self, id: Uuid) -> Result<Option<Opportunity>>;

    /// Records that have not been added to the index yet.
    async fn pending(&self) -> Result<Vec<Opportunity>>;

    /// Records whose description is in the index.
    async fn vectorized(&self) -> Result<Vec<Opportunity>>;

    /// Set `vectorized = true` on every listed record. Unknown ids are ignored.
    async fn mark_vectorized(&self, ids: &[Uuid]) -> Result<()>;
}
