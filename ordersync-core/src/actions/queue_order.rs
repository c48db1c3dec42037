//! QueueOrderForSync action
//!
//! Registers an order for pickup by the next batch run. Idempotent with
//! respect to repeated calls while the order is already pickup-eligible.

use crate::model::AdditionalInformation;
use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

use super::{
    ActionContext, ActionResult, append_history, persist_record, resolve_or_create,
    transition_metadata,
};

/// Queue one order for sync.
#[derive(Debug, Clone)]
pub struct QueueOrderForSync {
    pub order_id: i64,
    pub via: String,
    pub additional_information: AdditionalInformation,
}

impl QueueOrderForSync {
    pub fn new(order_id: i64) -> Self {
        Self {
            order_id,
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

    pub async fn execute(&self, ctx: &ActionContext) -> ActionResult {
        let resolved = match resolve_or_create(ctx, self.order_id).await {
            Ok(resolved) => resolved,
            Err(message) => return ActionResult::failed(message),
        };
        let mut record = resolved.record;
        let original_status = resolved.original_status;

        let mut result = ActionResult {
            success: true,
            outcome: ActionOutcome::Success,
            record: None,
            history: None,
            messages: Vec::new(),
        };

        // Re-queueing a pickup-eligible record is a no-op; Retry and Partial
        // count as queued-equivalent.
        if original_status.can_initiate_sync() {
            result.outcome = ActionOutcome::Noop;
            result
                .messages
                .push("Order is already in a queued state".to_string());
        } else {
            record.status = SyncStatus::Queued;
        }

        let Some(stored) = persist_record(ctx, &mut result, record).await else {
            return result;
        };

        let new_status = (stored.status != original_status).then_some(stored.status);
        let info = transition_metadata(
            self.additional_information.clone(),
            &stored,
            original_status,
            new_status,
        );
        let outcome = result.outcome;
        append_history(
            ctx,
            &mut result,
            stored.id.unwrap_or_default(),
            HistoryAction::Queue,
            &self.via,
            outcome,
            info,
        )
        .await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SyncOrderRepository;
    use crate::testing::TestHarness;

    #[tokio::test]
    async fn first_queue_creates_queued_record() {
        let harness = TestHarness::new(5);
        harness.add_order(10, 1);

        let result = QueueOrderForSync::new(10)
            .via("PHPUnit")
            .execute(&harness.ctx)
            .await;

        assert!(result.success);
        assert_eq!(result.outcome, ActionOutcome::Success);

        let record = result.record.unwrap();
        assert!(record.is_saved());
        assert_eq!(record.status, SyncStatus::Queued);
        assert_eq!(record.attempts, 0);

        let history = result.history.unwrap();
        assert_eq!(history.action, HistoryAction::Queue);
        assert_eq!(history.via, "PHPUnit");
        assert_eq!(history.additional_information["original_status"], "");
        assert_eq!(history.additional_information["new_status"], "queued");
        assert_eq!(history.additional_information["order_id"], 10);
        assert_eq!(history.additional_information["store_id"], 1);
    }

    #[tokio::test]
    async fn requeue_of_queued_record_is_noop() {
        let harness = TestHarness::new(5);
        harness.add_order(10, 1);

        QueueOrderForSync::new(10).execute(&harness.ctx).await;
        let result = QueueOrderForSync::new(10).execute(&harness.ctx).await;

        assert!(result.success);
        assert_eq!(result.outcome, ActionOutcome::Noop);
        assert!(
            result
                .messages
                .iter()
                .any(|m| m == "Order is already in a queued state")
        );

        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Queued);
        assert_eq!(record.attempts, 0);

        // No-op transitions still leave an audit row.
        let history = harness.history.all();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].result, ActionOutcome::Noop);
        assert!(!history[1].additional_information.contains_key("new_status"));
    }

    #[tokio::test]
    async fn retry_and_partial_count_as_queued() {
        for status in [SyncStatus::Retry, SyncStatus::Partial] {
            let harness = TestHarness::new(5);
            harness.add_order(10, 1);

            let mut record = crate::model::SyncOrderRecord::new(10, 1);
            record.status = status;
            record.attempts = 2;
            harness.sync_orders.save(&record).await.unwrap();

            let result = QueueOrderForSync::new(10).execute(&harness.ctx).await;

            assert_eq!(result.outcome, ActionOutcome::Noop, "status {status}");
            let record = result.record.unwrap();
            assert_eq!(record.status, status);
            assert_eq!(record.attempts, 2);
        }
    }

    #[tokio::test]
    async fn terminal_record_is_requeued_with_attempts_preserved() {
        for status in [SyncStatus::Processing, SyncStatus::Synced, SyncStatus::Error] {
            let harness = TestHarness::new(5);
            harness.add_order(10, 1);

            let mut record = crate::model::SyncOrderRecord::new(10, 1);
            record.status = status;
            record.attempts = 3;
            harness.sync_orders.save(&record).await.unwrap();

            let result = QueueOrderForSync::new(10).execute(&harness.ctx).await;

            assert!(result.success, "status {status}");
            assert_eq!(result.outcome, ActionOutcome::Success);
            let record = result.record.unwrap();
            assert_eq!(record.status, SyncStatus::Queued);
            assert_eq!(record.attempts, 3);

            let history = result.history.unwrap();
            assert_eq!(
                history.additional_information["original_status"],
                status.as_str()
            );
            assert_eq!(history.additional_information["new_status"], "queued");
        }
    }

    #[tokio::test]
    async fn missing_order_fails_without_records() {
        let harness = TestHarness::new(5);

        let result = QueueOrderForSync::new(404).execute(&harness.ctx).await;

        assert!(!result.success);
        assert!(result.record.is_none());
        assert!(result.history.is_none());
        assert!(result.messages[0].contains("does not exist"));
        assert!(harness.history.all().is_empty());
    }

    #[tokio::test]
    async fn record_save_failure_returns_undurable_record() {
        let harness = TestHarness::new(5);
        harness.add_order(10, 1);
        harness.sync_orders.fail_next_save();

        let result = QueueOrderForSync::new(10).execute(&harness.ctx).await;

        assert!(!result.success);
        let record = result.record.unwrap();
        assert_eq!(record.id, None);
        assert_eq!(record.status, SyncStatus::Queued);
        assert!(result.history.is_none());
        assert!(harness.history.all().is_empty());
        assert!(result.messages[0].contains("simulated save failure"));
    }

    #[tokio::test]
    async fn history_save_failure_keeps_success() {
        let harness = TestHarness::new(5);
        harness.add_order(10, 1);
        harness.history.fail_next_save();

        let result = QueueOrderForSync::new(10).execute(&harness.ctx).await;

        assert!(result.success);
        assert!(result.record.unwrap().is_saved());
        let history = result.history.unwrap();
        assert_eq!(history.id, None);
        assert!(
            result
                .messages
                .iter()
                .any(|m| m.contains("simulated history save failure"))
        );
    }

    #[tokio::test]
    async fn caller_metadata_is_preserved() {
        let harness = TestHarness::new(5);
        harness.add_order(10, 1);

        let mut info = AdditionalInformation::new();
        info.insert("trigger".to_string(), serde_json::json!("checkout"));

        let result = QueueOrderForSync::new(10)
            .with_information(info)
            .execute(&harness.ctx)
            .await;

        let history = result.history.unwrap();
        assert_eq!(history.additional_information["trigger"], "checkout");
    }
}
