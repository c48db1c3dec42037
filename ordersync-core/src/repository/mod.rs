//! Repository traits and query types
//!
//! Storage access goes through these traits so the action layer and
//! orchestrators never see SQL. The SQLite implementations live in
//! [`sqlite`]; in-memory doubles for tests live in [`crate::testing`].

pub mod sqlite;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::{SyncOrderHistoryRecord, SyncOrderRecord};
use crate::status::SyncStatus;

/// Typed filter consumed by [`SyncOrderRepository::list`].
///
/// Empty vectors mean "no constraint on this dimension".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOrderQuery {
    pub order_ids: Vec<i64>,
    pub store_ids: Vec<i64>,
    pub statuses: Vec<SyncStatus>,
    /// Upper bound on returned rows (batch size).
    pub page_size: Option<u32>,
}

/// Store for [`SyncOrderRecord`] rows.
///
/// `save` assigns `id` on first persist and returns the stored record.
/// Implementations keep an identity map keyed by id and order id;
/// `clear_cache` drops it.
#[async_trait]
pub trait SyncOrderRepository: Send + Sync {
    async fn get(&self, id: i64) -> SyncResult<Option<SyncOrderRecord>>;

    async fn get_by_order_id(&self, order_id: i64) -> SyncResult<Option<SyncOrderRecord>>;

    async fn save(&self, record: &SyncOrderRecord) -> SyncResult<SyncOrderRecord>;

    async fn delete(&self, id: i64) -> SyncResult<()>;

    async fn list(&self, query: &SyncOrderQuery) -> SyncResult<Vec<SyncOrderRecord>>;

    fn clear_cache(&self);
}

/// Store for the append-only [`SyncOrderHistoryRecord`] audit trail.
#[async_trait]
pub trait SyncOrderHistoryRepository: Send + Sync {
    async fn save(&self, record: &SyncOrderHistoryRecord) -> SyncResult<SyncOrderHistoryRecord>;

    async fn get_by_sync_order_id(
        &self,
        sync_order_id: i64,
    ) -> SyncResult<Vec<SyncOrderHistoryRecord>>;

    async fn delete(&self, id: i64) -> SyncResult<()>;
}
