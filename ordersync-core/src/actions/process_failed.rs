//! ProcessFailedOrderSync action
//!
//! Central retry decision point for a failed sync attempt: requeue as
//! `Retry` while under the configured threshold, park as `Error` once the
//! threshold is reached.

use serde_json::json;

use crate::error::{SyncError, SyncResult};
use crate::model::AdditionalInformation;
use crate::orders::OrderRef;
use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

use super::{
    ActionContext, ActionResult, append_history, persist_record, resolve_or_create_for_order,
    transition_metadata,
};

const REQUEUE_REASON: &str =
    "Order requeued after failed sync attempt within configured threshold";

/// Record a failed sync attempt for one order.
#[derive(Debug, Clone)]
pub struct ProcessFailedOrderSync {
    pub order: OrderRef,
    pub via: String,
    pub additional_information: AdditionalInformation,
}

impl ProcessFailedOrderSync {
    pub fn new(order: OrderRef) -> Self {
        Self {
            order,
            via: String::new(),
            additional_information: AdditionalInformation::new(),
        }
    }

    pub fn via(mut self, via: impl Into<String>) -> Self {
        self.via = via.into();
        self
    }

    pub fn with_information(mut self, info: AdditionalInformation) -> Self {
        self.additional_information = info;
        self
    }

    /// Errors when the order was never saved (no entity id to key a record
    /// on); every other failure is captured into the result.
    pub async fn execute(&self, ctx: &ActionContext) -> SyncResult<ActionResult> {
        if !self.order.is_saved() {
            return Err(SyncError::OrderNotValid);
        }

        let resolved = match resolve_or_create_for_order(ctx, &self.order).await {
            Ok(resolved) => resolved,
            Err(message) => return Ok(ActionResult::failed(message)),
        };
        let mut record = resolved.record;
        let original_status = resolved.original_status;
        let original_attempts = record.attempts;

        let current_attempts = record.attempts;
        let max_attempts = ctx.config.max_attempts();

        let mut info = self.additional_information.clone();
        let action = if current_attempts < max_attempts {
            record.attempts += 1;
            record.status = SyncStatus::Retry;
            info.insert("reason".to_string(), json!(REQUEUE_REASON));
            HistoryAction::Queue
        } else if current_attempts > 0 {
            // The attempt that triggered this transition is already counted.
            record.status = SyncStatus::Error;
            HistoryAction::ProcessEnd
        } else {
            // Historical quirk kept for parity with the legacy behaviour: a
            // record with zero attempts facing a non-positive threshold
            // lands in Queued instead of Retry or Error.
            record.status = SyncStatus::Queued;
            HistoryAction::Queue
        };

        let changed =
            record.status != original_status || record.attempts != original_attempts;
        let outcome = if changed {
            ActionOutcome::Success
        } else {
            ActionOutcome::Noop
        };

        let mut result = ActionResult {
            success: true,
            outcome,
            record: None,
            history: None,
            messages: Vec::new(),
        };

        let Some(stored) = persist_record(ctx, &mut result, record).await else {
            return Ok(result);
        };

        let new_status = (stored.status != original_status).then_some(stored.status);
        let info = transition_metadata(info, &stored, original_status, new_status);
        append_history(
            ctx,
            &mut result,
            stored.id.unwrap_or_default(),
            action,
            &self.via,
            outcome,
            info,
        )
        .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SyncOrderRecord;
    use crate::repository::SyncOrderRepository;
    use crate::testing::TestHarness;

    fn order(order_id: i64) -> OrderRef {
        OrderRef {
            id: order_id,
            store_id: 1,
            increment_id: format!("1{order_id:08}"),
        }
    }

    async fn seed_record(
        harness: &TestHarness,
        order_id: i64,
        status: SyncStatus,
        attempts: i32,
    ) {
        harness.add_order(order_id, 1);
        let mut record = SyncOrderRecord::new(order_id, 1);
        record.status = status;
        record.attempts = attempts;
        harness.sync_orders.save(&record).await.unwrap();
    }

    #[tokio::test]
    async fn under_threshold_requeues_as_retry() {
        let harness = TestHarness::new(4);
        seed_record(&harness, 40, SyncStatus::Processing, 3).await;

        let result = ProcessFailedOrderSync::new(order(40))
            .via("Cron")
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.outcome, ActionOutcome::Success);
        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Retry);
        assert_eq!(record.attempts, 4);

        let history = result.history.unwrap();
        assert_eq!(history.action, HistoryAction::Queue);
        assert_eq!(history.additional_information["reason"], REQUEUE_REASON);
    }

    #[tokio::test]
    async fn at_threshold_parks_as_error_without_incrementing() {
        let harness = TestHarness::new(3);
        seed_record(&harness, 40, SyncStatus::Processing, 3).await;

        let result = ProcessFailedOrderSync::new(order(40))
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert!(result.success);
        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Error);
        assert_eq!(record.attempts, 3);

        let history = result.history.unwrap();
        assert_eq!(history.action, HistoryAction::ProcessEnd);
        assert!(!history.additional_information.contains_key("reason"));
    }

    #[tokio::test]
    async fn over_threshold_behaves_like_at_threshold() {
        let harness = TestHarness::new(2);
        seed_record(&harness, 40, SyncStatus::Retry, 5).await;

        let result = ProcessFailedOrderSync::new(order(40))
            .execute(&harness.ctx)
            .await
            .unwrap();

        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Error);
        assert_eq!(record.attempts, 5);
    }

    #[tokio::test]
    async fn first_failure_of_fresh_order_starts_retry() {
        let harness = TestHarness::new(5);
        harness.add_order(40, 1);

        let result = ProcessFailedOrderSync::new(order(40))
            .execute(&harness.ctx)
            .await
            .unwrap();

        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Retry);
        assert_eq!(record.attempts, 1);

        let history = result.history.unwrap();
        assert_eq!(history.additional_information["original_status"], "");
    }

    // Documented quirk: a zero-attempt record facing a non-positive
    // threshold ends up Queued with attempts still 0.
    #[tokio::test]
    async fn zero_attempts_with_non_positive_threshold_lands_in_queued() {
        let harness = TestHarness::new(0);
        harness.add_order(40, 1);

        let result = ProcessFailedOrderSync::new(order(40))
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert!(result.success);
        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Queued);
        assert_eq!(record.attempts, 0);
    }

    #[tokio::test]
    async fn quirk_also_applies_to_existing_records() {
        for status in [SyncStatus::Processing, SyncStatus::Synced, SyncStatus::Error] {
            let harness = TestHarness::new(0);
            seed_record(&harness, 40, status, 0).await;

            let result = ProcessFailedOrderSync::new(order(40))
                .execute(&harness.ctx)
                .await
                .unwrap();

            let record = result.record.unwrap();
            assert_eq!(record.status, SyncStatus::Queued, "from {status}");
            assert_eq!(record.attempts, 0);
        }
    }

    #[tokio::test]
    async fn repeated_failure_past_threshold_is_noop_but_logged() {
        let harness = TestHarness::new(2);
        seed_record(&harness, 40, SyncStatus::Error, 2).await;

        let result = ProcessFailedOrderSync::new(order(40))
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.outcome, ActionOutcome::Noop);
        assert_eq!(result.record.unwrap().status, SyncStatus::Error);

        let history = harness.history.all();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result, ActionOutcome::Noop);
    }

    #[tokio::test]
    async fn unsaved_order_is_rejected() {
        let harness = TestHarness::new(5);

        let unsaved = OrderRef {
            id: 0,
            store_id: 1,
            increment_id: String::new(),
        };
        let err = ProcessFailedOrderSync::new(unsaved)
            .execute(&harness.ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::OrderNotValid));
    }
}
