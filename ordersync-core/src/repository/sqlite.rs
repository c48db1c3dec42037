//! SQLite-backed repositories
//!
//! Hand-written SQL over an `sqlx` pool. The sync-order repository carries an
//! explicit identity map (id and order-id keyed) so repeated lookups within
//! one run hit memory, mirroring the caching the surrounding platform's ORM
//! used to provide; `clear_cache` empties it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::SyncResult;
use crate::model::{AdditionalInformation, SyncOrderHistoryRecord, SyncOrderRecord};
use crate::repository::{SyncOrderHistoryRepository, SyncOrderQuery, SyncOrderRepository};
use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

/// Create the sync tables if they do not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> SyncResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_order (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id BIGINT NOT NULL UNIQUE,
            store_id BIGINT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_order_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sync_order_id BIGINT NOT NULL,
            created_at TEXT NOT NULL,
            action TEXT NOT NULL,
            via TEXT NOT NULL DEFAULT '',
            result TEXT NOT NULL,
            additional_information TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sync_order_history_owner
         ON sync_order_history (sync_order_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_store_config (
            store_id BIGINT PRIMARY KEY,
            sync_enabled INTEGER NOT NULL DEFAULT 0,
            api_key TEXT,
            ip_address_attribute TEXT,
            excluded_statuses TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Default)]
struct IdentityMap {
    by_id: HashMap<i64, SyncOrderRecord>,
    id_by_order: HashMap<i64, i64>,
}

impl IdentityMap {
    fn insert(&mut self, record: &SyncOrderRecord) {
        if let Some(id) = record.id {
            self.by_id.insert(id, record.clone());
            self.id_by_order.insert(record.order_id, id);
        }
    }

    fn remove(&mut self, id: i64) {
        if let Some(record) = self.by_id.remove(&id) {
            self.id_by_order.remove(&record.order_id);
        }
    }
}

/// [`SyncOrderRepository`] backed by SQLite.
pub struct SqliteSyncOrderRepository {
    pool: SqlitePool,
    cache: Mutex<IdentityMap>,
}

impl SqliteSyncOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: Mutex::new(IdentityMap::default()),
        }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> SyncResult<SyncOrderRecord> {
        let status: String = row.try_get("status")?;
        Ok(SyncOrderRecord {
            id: Some(row.try_get("id")?),
            order_id: row.try_get("order_id")?,
            store_id: row.try_get("store_id")?,
            status: SyncStatus::from_str(&status)?,
            attempts: row.try_get("attempts")?,
        })
    }

    fn cache_insert(&self, record: &SyncOrderRecord) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(record);
        }
    }
}

#[async_trait]
impl SyncOrderRepository for SqliteSyncOrderRepository {
    async fn get(&self, id: i64) -> SyncResult<Option<SyncOrderRecord>> {
        if let Ok(cache) = self.cache.lock()
            && let Some(record) = cache.by_id.get(&id)
        {
            return Ok(Some(record.clone()));
        }

        let row = sqlx::query(
            "SELECT id, order_id, store_id, status, attempts FROM sync_order WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let record = Self::row_to_record(&row)?;
                self.cache_insert(&record);
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn get_by_order_id(&self, order_id: i64) -> SyncResult<Option<SyncOrderRecord>> {
        if let Ok(cache) = self.cache.lock()
            && let Some(id) = cache.id_by_order.get(&order_id)
            && let Some(record) = cache.by_id.get(id)
        {
            return Ok(Some(record.clone()));
        }

        let row = sqlx::query(
            "SELECT id, order_id, store_id, status, attempts FROM sync_order WHERE order_id = ?",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let record = Self::row_to_record(&row)?;
                self.cache_insert(&record);
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, record: &SyncOrderRecord) -> SyncResult<SyncOrderRecord> {
        let mut stored = record.clone();

        match record.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE sync_order SET order_id = ?, store_id = ?, status = ?, attempts = ?
                     WHERE id = ?",
                )
                .bind(record.order_id)
                .bind(record.store_id)
                .bind(record.status.as_str())
                .bind(record.attempts)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO sync_order (order_id, store_id, status, attempts)
                     VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(record.order_id)
                .bind(record.store_id)
                .bind(record.status.as_str())
                .bind(record.attempts)
                .fetch_one(&self.pool)
                .await?;
                stored.id = Some(id);
            }
        }

        self.cache_insert(&stored);
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> SyncResult<()> {
        sqlx::query("DELETE FROM sync_order WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(id);
        }
        Ok(())
    }

    async fn list(&self, query: &SyncOrderQuery) -> SyncResult<Vec<SyncOrderRecord>> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, order_id, store_id, status, attempts FROM sync_order WHERE 1 = 1",
        );

        if !query.order_ids.is_empty() {
            builder.push(" AND order_id IN (");
            {
                let mut values = builder.separated(", ");
                for order_id in &query.order_ids {
                    values.push_bind(*order_id);
                }
            }
            builder.push(")");
        }
        if !query.store_ids.is_empty() {
            builder.push(" AND store_id IN (");
            {
                let mut values = builder.separated(", ");
                for store_id in &query.store_ids {
                    values.push_bind(*store_id);
                }
            }
            builder.push(")");
        }
        if !query.statuses.is_empty() {
            builder.push(" AND status IN (");
            {
                let mut values = builder.separated(", ");
                for status in &query.statuses {
                    values.push_bind(status.as_str());
                }
            }
            builder.push(")");
        }

        builder.push(" ORDER BY id");
        if let Some(limit) = query.page_size {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::row_to_record(row)?;
            self.cache_insert(&record);
            records.push(record);
        }
        Ok(records)
    }

    fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = IdentityMap::default();
        }
    }
}

/// [`SyncOrderHistoryRepository`] backed by SQLite.
pub struct SqliteSyncOrderHistoryRepository {
    pool: SqlitePool,
}

impl SqliteSyncOrderHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> SyncResult<SyncOrderHistoryRecord> {
        let action: String = row.try_get("action")?;
        let result: String = row.try_get("result")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let info: String = row.try_get("additional_information")?;
        let additional_information: AdditionalInformation = serde_json::from_str(&info)?;

        Ok(SyncOrderHistoryRecord {
            id: Some(row.try_get("id")?),
            sync_order_id: row.try_get("sync_order_id")?,
            created_at,
            action: HistoryAction::from_str(&action)?,
            via: row.try_get("via")?,
            result: ActionOutcome::from_str(&result)?,
            additional_information,
        })
    }
}

#[async_trait]
impl SyncOrderHistoryRepository for SqliteSyncOrderHistoryRepository {
    async fn save(&self, record: &SyncOrderHistoryRecord) -> SyncResult<SyncOrderHistoryRecord> {
        let mut stored = record.clone();
        let info = serde_json::to_string(&record.additional_information)?;

        match record.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE sync_order_history
                     SET sync_order_id = ?, created_at = ?, action = ?, via = ?, result = ?,
                         additional_information = ?
                     WHERE id = ?",
                )
                .bind(record.sync_order_id)
                .bind(record.created_at)
                .bind(record.action.as_str())
                .bind(&record.via)
                .bind(record.result.as_str())
                .bind(&info)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                // created_at is server-assigned: stamp at insert time.
                stored.created_at = Utc::now();
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO sync_order_history
                     (sync_order_id, created_at, action, via, result, additional_information)
                     VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
                )
                .bind(record.sync_order_id)
                .bind(stored.created_at)
                .bind(record.action.as_str())
                .bind(&record.via)
                .bind(record.result.as_str())
                .bind(&info)
                .fetch_one(&self.pool)
                .await?;
                stored.id = Some(id);
            }
        }

        Ok(stored)
    }

    async fn get_by_sync_order_id(
        &self,
        sync_order_id: i64,
    ) -> SyncResult<Vec<SyncOrderHistoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, sync_order_id, created_at, action, via, result, additional_information
             FROM sync_order_history WHERE sync_order_id = ? ORDER BY id",
        )
        .bind(sync_order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn delete(&self, id: i64) -> SyncResult<()> {
        sqlx::query("DELETE FROM sync_order_history WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
