//! Order lookup collaborator
//!
//! The host platform owns the order model; this subsystem only needs an id,
//! a store scope and the display increment id. The SQLite implementation
//! reads a host `orders` table so the CLI is runnable end-to-end.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::SyncResult;

/// Minimal view of a host order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRef {
    /// Entity id; 0 for an order that was never saved.
    pub id: i64,
    pub store_id: i64,
    /// Human-facing order number.
    pub increment_id: String,
}

impl OrderRef {
    /// Whether the order has a persisted entity id.
    pub fn is_saved(&self) -> bool {
        self.id > 0
    }
}

/// Read access to host orders.
#[async_trait]
pub trait OrderLookup: Send + Sync {
    /// Resolve one order; `None` when it does not exist.
    async fn get_order(&self, order_id: i64) -> SyncResult<Option<OrderRef>>;

    /// Candidate order ids for queueing: orders of the given stores whose
    /// host order status is not excluded. Empty `store_ids` means all stores.
    async fn order_ids_for_stores(
        &self,
        store_ids: &[i64],
        excluded_statuses: &HashSet<String>,
    ) -> SyncResult<Vec<i64>>;
}

/// [`OrderLookup`] over a host `orders` table
/// (`entity_id`, `store_id`, `increment_id`, `status`).
pub struct SqliteOrderLookup {
    pool: SqlitePool,
}

impl SqliteOrderLookup {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderLookup for SqliteOrderLookup {
    async fn get_order(&self, order_id: i64) -> SyncResult<Option<OrderRef>> {
        let row = sqlx::query(
            "SELECT entity_id, store_id, increment_id FROM orders WHERE entity_id = ?",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| OrderRef {
            id: row.get("entity_id"),
            store_id: row.get("store_id"),
            increment_id: row.get("increment_id"),
        }))
    }

    async fn order_ids_for_stores(
        &self,
        store_ids: &[i64],
        excluded_statuses: &HashSet<String>,
    ) -> SyncResult<Vec<i64>> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT entity_id FROM orders WHERE 1 = 1");

        if !store_ids.is_empty() {
            builder.push(" AND store_id IN (");
            {
                let mut values = builder.separated(", ");
                for store_id in store_ids {
                    values.push_bind(*store_id);
                }
            }
            builder.push(")");
        }
        if !excluded_statuses.is_empty() {
            builder.push(" AND status NOT IN (");
            {
                let mut values = builder.separated(", ");
                for status in excluded_statuses {
                    values.push_bind(status.clone());
                }
            }
            builder.push(")");
        }
        builder.push(" ORDER BY entity_id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get("entity_id")).collect())
    }
}
