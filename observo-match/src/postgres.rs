//! PostgreSQL opportunity store.
//!
//! This module is only available when the `pgvector` feature is enabled.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::corpus::OpportunityStore;
use crate::error::{MatchError, Result};
use crate::opportunity::Opportunity;

const BACKEND: &str = "postgres";

const COLUMNS: &str = "id, identifier, code, title, link, agency, head, categories, awards, \
    funding, applications, awarded, opened, closed, archived, summary, eligibility, \
    instruction, source, vectorized";

/// An [`OpportunityStore`] backed by the `opportunities` table.
pub struct PgOpportunityStore {
    pool: PgPool,
}

impl PgOpportunityStore {
    /// Connect to `database_url` and make sure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool =
            PgPoolOptions::new().max_connections(5).connect(database_url).await.map_err(map_err)?;
        Self::from_pool(pool).await
    }

    /// Use an existing connection pool and make sure the table exists.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS opportunities (\
                id UUID PRIMARY KEY, \
                identifier TEXT NOT NULL UNIQUE, \
                code TEXT NOT NULL DEFAULT '', \
                title TEXT NOT NULL, \
                link TEXT, \
                agency TEXT NOT NULL DEFAULT '', \
                head TEXT NOT NULL DEFAULT '', \
                categories TEXT[] NOT NULL DEFAULT '{}', \
                awards INTEGER, \
                funding BIGINT, \
                applications INTEGER, \
                awarded INTEGER, \
                opened DATE, \
                closed DATE, \
                archived DATE, \
                summary TEXT, \
                eligibility TEXT, \
                instruction TEXT, \
                source TEXT, \
                vectorized BOOLEAN NOT NULL DEFAULT FALSE\
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn select_by_flag(&self, vectorized: bool) -> Result<Vec<Opportunity>> {
        let sql = format!("SELECT {COLUMNS} FROM opportunities WHERE vectorized = $1 ORDER BY id");
        let rows =
            sqlx::query(&sql).bind(vectorized).fetch_all(&self.pool).await.map_err(map_err)?;
        rows.iter().map(opportunity_from_row).collect()
    }
}

#[async_trait]
impl OpportunityStore for PgOpportunityStore {
    async fn get(&self, id: Uuid) -> Result<Option<Opportunity>> {
        let sql = format!("SELECT {COLUMNS} FROM opportunities WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await.map_err(map_err)?;
        row.as_ref().map(opportunity_from_row).transpose()
    }

    async fn pending(&self) -> Result<Vec<Opportunity>> {
        self.select_by_flag(false).await
    }

    async fn vectorized(&self) -> Result<Vec<Opportunity>> {
        self.select_by_flag(true).await
    }

    async fn mark_vectorized(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let result = sqlx::query("UPDATE opportunities SET vectorized = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        debug!(requested = ids.len(), updated = result.rows_affected(), "marked vectorized");
        Ok(())
    }
}

fn map_err(e: sqlx::Error) -> MatchError {
    MatchError::corpus(BACKEND, e.to_string())
}

/// Negative counts cannot be represented and are treated as absent.
fn count(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn opportunity_from_row(row: &PgRow) -> Result<Opportunity> {
    let funding: Option<i64> = row.try_get("funding").map_err(map_err)?;
    Ok(Opportunity {
        id: row.try_get("id").map_err(map_err)?,
        identifier: row.try_get("identifier").map_err(map_err)?,
        code: row.try_get("code").map_err(map_err)?,
        title: row.try_get("title").map_err(map_err)?,
        link: row.try_get("link").map_err(map_err)?,
        agency: row.try_get("agency").map_err(map_err)?,
        head: row.try_get("head").map_err(map_err)?,
        categories: row.try_get("categories").map_err(map_err)?,
        awards: count(row.try_get("awards").map_err(map_err)?),
        funding: funding.and_then(|v| u64::try_from(v).ok()),
        applications: count(row.try_get("applications").map_err(map_err)?),
        awarded: count(row.try_get("awarded").map_err(map_err)?),
        opened: row.try_get("opened").map_err(map_err)?,
        closed: row.try_get("closed").map_err(map_err)?,
        archived: row.try_get("archived").map_err(map_err)?,
        summary: row.try_get("summary").map_err(map_err)?,
        eligibility: row.try_get("eligibility").map_err(map_err)?,
        instruction: row.try_get("instruction").map_err(map_err)?,
        source: row.try_get("source").map_err(map_err)?,
        vectorized: row.try_get("vectorized").map_err(map_err)?,
    })
}
