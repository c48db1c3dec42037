//! UpdateSyncOrderHistoryForOrderId action
//!
//! Bulk-overwrites fields on every history row of an order's sync record.
//! Used by the migration orchestrator to relabel freshly written rows.

use crate::error::SyncResult;
use crate::model::AdditionalInformation;
use crate::status::{ActionOutcome, HistoryAction};

use super::ActionContext;

/// Field overrides to apply; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct HistoryUpdate {
    pub action: Option<HistoryAction>,
    pub via: Option<String>,
    pub result: Option<ActionOutcome>,
    pub additional_information: Option<AdditionalInformation>,
}

/// Apply a [`HistoryUpdate`] to all history rows of one order.
#[derive(Debug, Clone)]
pub struct UpdateSyncOrderHistoryForOrderId {
    pub order_id: i64,
    pub update: HistoryUpdate,
    /// When true, the first save failure propagates; when false, failures
    /// are logged and the remaining rows are still updated.
    pub throw_on_exception: bool,
}

impl UpdateSyncOrderHistoryForOrderId {
    pub fn new(order_id: i64, update: HistoryUpdate) -> Self {
        Self {
            order_id,
            update,
            throw_on_exception: false,
        }
    }

    pub fn throw_on_exception(mut self, throw: bool) -> Self {
        self.throw_on_exception = throw;
        self
    }

    /// Returns the number of rows updated; zero rows is a silent no-op.
    pub async fn execute(&self, ctx: &ActionContext) -> SyncResult<usize> {
        let Some(record) = ctx.sync_orders.get_by_order_id(self.order_id).await? else {
            return Ok(0);
        };
        let Some(sync_order_id) = record.id else {
            return Ok(0);
        };

        let rows = ctx.history.get_by_sync_order_id(sync_order_id).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut updated = 0;
        for mut row in rows {
            if let Some(action) = self.update.action {
                row.action = action;
            }
            if let Some(via) = &self.update.via {
                row.via = via.clone();
            }
            if let Some(result) = self.update.result {
                row.result = result;
            }
            if let Some(info) = &self.update.additional_information {
                row.additional_information = info.clone();
            }

            match ctx.history.save(&row).await {
                Ok(_) => updated += 1,
                Err(e) if self.throw_on_exception => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        order_id = self.order_id,
                        history_id = row.id,
                        "failed to update sync order history row: {e}"
                    );
                }
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::QueueOrderForSync;
    use crate::testing::TestHarness;

    #[tokio::test]
    async fn overwrites_all_rows_leaving_unspecified_fields() {
        let harness = TestHarness::new(5);
        harness.add_order(50, 1);

        QueueOrderForSync::new(50)
            .via("Cron")
            .execute(&harness.ctx)
            .await;
        QueueOrderForSync::new(50)
            .via("Cron")
            .execute(&harness.ctx)
            .await;

        let update = HistoryUpdate {
            action: Some(HistoryAction::Migrate),
            via: Some("Database Migration".to_string()),
            ..HistoryUpdate::default()
        };
        let updated = UpdateSyncOrderHistoryForOrderId::new(50, update)
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert_eq!(updated, 2);
        for row in harness.history.all() {
            assert_eq!(row.action, HistoryAction::Migrate);
            assert_eq!(row.via, "Database Migration");
            // Result and metadata were not part of the update.
            assert!(row.additional_information.contains_key("order_id"));
        }
    }

    #[tokio::test]
    async fn zero_rows_is_a_noop() {
        let harness = TestHarness::new(5);

        let updated = UpdateSyncOrderHistoryForOrderId::new(99, HistoryUpdate::default())
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn save_failure_propagates_when_throwing() {
        let harness = TestHarness::new(5);
        harness.add_order(50, 1);
        QueueOrderForSync::new(50).execute(&harness.ctx).await;

        harness.history.fail_next_save();

        let result = UpdateSyncOrderHistoryForOrderId::new(
            50,
            HistoryUpdate {
                via: Some("Database Migration".to_string()),
                ..HistoryUpdate::default()
            },
        )
        .throw_on_exception(true)
        .execute(&harness.ctx)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn save_failure_continues_when_not_throwing() {
        let harness = TestHarness::new(5);
        harness.add_order(50, 1);
        QueueOrderForSync::new(50).execute(&harness.ctx).await;
        QueueOrderForSync::new(50).execute(&harness.ctx).await;

        harness.history.fail_next_save();

        let updated = UpdateSyncOrderHistoryForOrderId::new(
            50,
            HistoryUpdate {
                via: Some("Database Migration".to_string()),
                ..HistoryUpdate::default()
            },
        )
        .execute(&harness.ctx)
        .await
        .unwrap();

        // First save failed, second went through.
        assert_eq!(updated, 1);
    }
}
