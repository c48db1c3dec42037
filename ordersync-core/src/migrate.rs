//! Migration orchestrator: legacy send-flag conversion
//!
//! One-time/triggerable sweep that converts the legacy per-order-item
//! send-flag table into sync records. Stores sharing an API credential are
//! migrated together so the sweep touches each account once.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use crate::actions::{
    ActionContext, HistoryUpdate, MarkOrderAsProcessed, QueueOrderForSync,
    UpdateSyncOrderHistoryForOrderId,
};
use crate::error::SyncResult;
use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

/// Origin label stamped on migrated history rows.
pub const MIGRATION_VIA: &str = "Database Migration";

/// One legacy send-flag row. `send` values: 0 pending, 1 sent, >= 2 error
/// sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySendFlag {
    pub order_id: i64,
    pub order_item_id: i64,
    pub send: i32,
}

/// Read access to the legacy send-flag table.
#[async_trait]
pub trait LegacySendFlagReader: Send + Sync {
    async fn send_flags_for_store(&self, store_id: i64) -> SyncResult<Vec<LegacySendFlag>>;
}

/// [`LegacySendFlagReader`] joining the legacy table against host orders
/// for store scoping.
pub struct SqliteLegacySendFlagReader {
    pool: SqlitePool,
}

impl SqliteLegacySendFlagReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LegacySendFlagReader for SqliteLegacySendFlagReader {
    async fn send_flags_for_store(&self, store_id: i64) -> SyncResult<Vec<LegacySendFlag>> {
        let rows = sqlx::query(
            "SELECT l.order_id, l.order_item_id, l.send
             FROM legacy_order_sync l
             JOIN orders o ON o.entity_id = l.order_id
             WHERE o.store_id = ?
             ORDER BY l.order_id, l.order_item_id",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LegacySendFlag {
                order_id: row.get("order_id"),
                order_item_id: row.get("order_item_id"),
                send: row.get("send"),
            })
            .collect())
    }
}

/// Aggregate an order's item send flags into its migrated status.
fn target_status(sends: &[i32]) -> SyncStatus {
    if sends.iter().any(|s| *s >= 2) {
        SyncStatus::Error
    } else if sends.iter().all(|s| *s == 0) {
        SyncStatus::Queued
    } else if sends.iter().all(|s| *s == 1) {
        SyncStatus::Synced
    } else {
        SyncStatus::Partial
    }
}

/// Per credential-group outcome.
#[derive(Debug, Clone)]
pub struct GroupReport {
    pub api_key: String,
    pub store_ids: Vec<i64>,
    pub orders_processed: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub groups: Vec<GroupReport>,
}

impl MigrationReport {
    pub fn total_orders(&self) -> usize {
        self.groups.iter().map(|g| g.orders_processed).sum()
    }
}

/// The legacy-table migration orchestrator.
pub struct MigrateLegacyOrderSyncRecords {
    ctx: ActionContext,
    legacy: Arc<dyn LegacySendFlagReader>,
}

impl MigrateLegacyOrderSyncRecords {
    pub fn new(ctx: ActionContext, legacy: Arc<dyn LegacySendFlagReader>) -> Self {
        Self { ctx, legacy }
    }

    /// Migrate one store, or every integrated store grouped by API key.
    /// Per-order failures are counted and logged, never fatal.
    pub async fn execute(&self, store_id: Option<i64>) -> SyncResult<MigrationReport> {
        let groups: Vec<(String, Vec<i64>)> = match store_id {
            Some(store_id) => {
                let key = self.ctx.config.api_key(store_id).unwrap_or_default();
                vec![(key, vec![store_id])]
            }
            None => {
                let mut by_key: BTreeMap<String, Vec<i64>> = BTreeMap::new();
                for store_id in self.ctx.config.integrated_stores() {
                    let key = self.ctx.config.api_key(store_id).unwrap_or_default();
                    by_key.entry(key).or_default().push(store_id);
                }
                by_key.into_iter().collect()
            }
        };

        let mut report = MigrationReport::default();
        for (api_key, store_ids) in groups {
            let group = self.migrate_group(api_key, store_ids).await?;
            report.groups.push(group);
        }
        Ok(report)
    }

    async fn migrate_group(&self, api_key: String, store_ids: Vec<i64>) -> SyncResult<GroupReport> {
        let started = Instant::now();
        let mut orders_processed = 0;
        let mut failures = 0;

        for store_id in &store_ids {
            let flags = self.legacy.send_flags_for_store(*store_id).await?;

            let mut by_order: BTreeMap<i64, Vec<i32>> = BTreeMap::new();
            for flag in flags {
                by_order.entry(flag.order_id).or_default().push(flag.send);
            }

            for (order_id, sends) in by_order {
                match self.migrate_order(order_id, &sends).await {
                    Ok(()) => orders_processed += 1,
                    Err(message) => {
                        failures += 1;
                        tracing::error!(
                            store_id,
                            order_id,
                            "failed to migrate legacy sync record: {message}"
                        );
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        tracing::info!(
            stores = ?store_ids,
            orders = orders_processed,
            failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "legacy order sync migration group finished"
        );

        Ok(GroupReport {
            api_key,
            store_ids,
            orders_processed,
            failures,
            elapsed,
        })
    }

    async fn migrate_order(&self, order_id: i64, sends: &[i32]) -> Result<(), String> {
        let status = target_status(sends);

        let result = match status {
            SyncStatus::Queued => {
                QueueOrderForSync::new(order_id)
                    .via(MIGRATION_VIA)
                    .execute(&self.ctx)
                    .await
            }
            status => MarkOrderAsProcessed::new(order_id, status)
                .via(MIGRATION_VIA)
                .execute(&self.ctx)
                .await
                .map_err(|e| e.to_string())?,
        };

        // Re-running the migration finds records already in place; a no-op
        // against a saved record is not a failure. A failure without a
        // record (order missing from the host) is.
        let benign_noop = result.outcome == ActionOutcome::Noop
            && result.record.as_ref().is_some_and(|r| r.is_saved());
        if !result.success && !benign_noop {
            return Err(result.messages.join("; "));
        }

        UpdateSyncOrderHistoryForOrderId::new(
            order_id,
            HistoryUpdate {
                action: Some(HistoryAction::Migrate),
                via: Some(MIGRATION_VIA.to_string()),
                ..HistoryUpdate::default()
            },
        )
        .execute(&self.ctx)
        .await
        .map_err(|e| e.to_string())?;

        Ok(())
    }
}
