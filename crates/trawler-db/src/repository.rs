use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use trawler_core::{CrawlError, PipelineStage};
use uuid::Uuid;

/// An item produced by a crawl handler, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlItem {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub data: serde_json::Value,
}

impl CrawlItem {
    pub fn new(url: impl Into<String>, status: u16, data: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HashMap::new(),
            data,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// A persisted [`CrawlItem`] with its generated identity.
#[derive(Debug, Clone, Serialize)]
pub struct StoredCrawlItem {
    pub id: Uuid,
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Repository for crawl items in PostgreSQL.
///
/// Also a [`PipelineStage`], so it can be registered on a crawler directly.
#[derive(Clone)]
pub struct CrawlItemRepository {
    pool: Pool<Postgres>,
}

impl CrawlItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an item. Returns the generated UUID.
    pub async fn save(&self, item: &CrawlItem) -> Result<Uuid, CrawlError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO crawl_items (url, status, headers, data)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&item.url)
        .bind(i32::from(item.status))
        .bind(Json(&item.headers))
        .bind(&item.data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CrawlError::Database(e.to_string()))?;

        Ok(row.0)
    }

    /// Total number of stored items.
    pub async fn count(&self) -> Result<i64, CrawlError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM crawl_items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CrawlError::Database(e.to_string()))
    }

    /// The most recently stored items, newest first.
    pub async fn latest(&self, limit: usize) -> Result<Vec<StoredCrawlItem>, CrawlError> {
        let rows = sqlx::query_as::<_, CrawlItemRow>(
            r#"
            SELECT id, url, status, headers, data, created_at
            FROM crawl_items
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CrawlError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

impl PipelineStage<CrawlItem> for CrawlItemRepository {
    fn name(&self) -> &str {
        "postgres"
    }

    fn process<'a>(&'a self, item: &'a CrawlItem) -> BoxFuture<'a, Result<(), CrawlError>> {
        Box::pin(async move {
            let id = self.save(item).await?;
            tracing::debug!(%id, url = %item.url, "Stored crawl item");
            Ok(())
        })
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct CrawlItemRow {
    id: Uuid,
    url: String,
    status: i32,
    headers: Json<HashMap<String, String>>,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<CrawlItemRow> for StoredCrawlItem {
    fn from(row: CrawlItemRow) -> Self {
        // chk_crawl_items_status keeps the column within u16.
        let status = u16::try_from(row.status).unwrap_or_else(|_| {
            tracing::warn!(id = %row.id, status = row.status, "Stored status outside u16 range");
            0
        });
        Self {
            id: row.id,
            url: row.url,
            status,
            headers: row.headers.0,
            data: row.data,
            created_at: row.created_at,
        }
    }
}
