//! MarkOrderAsProcessing action
//!
//! Claims an order for one sync attempt. The refusal when the record is
//! already `Processing` is the subsystem's only (advisory) concurrency
//! guard; the host environment serializes the rest.

use crate::model::AdditionalInformation;
use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

use super::{
    ActionContext, ActionResult, append_history, persist_record, resolve_or_create,
    transition_metadata,
};

/// Mark one order's sync as started.
#[derive(Debug, Clone)]
pub struct MarkOrderAsProcessing {
    pub order_id: i64,
    pub via: String,
    pub additional_information: AdditionalInformation,
}

impl MarkOrderAsProcessing {
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

        if original_status == SyncStatus::Processing {
            // A second attempt to start processing must not proceed.
            result.success = false;
            result.outcome = ActionOutcome::Noop;
            result
                .messages
                .push("Order is already being processed".to_string());
        } else {
            record.attempts += 1;
            record.status = SyncStatus::Processing;
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
            HistoryAction::ProcessStart,
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
    async fn fresh_order_gets_one_attempt() {
        let harness = TestHarness::new(5);
        harness.add_order(20, 1);

        let result = MarkOrderAsProcessing::new(20).execute(&harness.ctx).await;

        assert!(result.success);
        assert_eq!(result.outcome, ActionOutcome::Success);
        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Processing);
        assert_eq!(record.attempts, 1);

        let history = result.history.unwrap();
        assert_eq!(history.action, HistoryAction::ProcessStart);
        assert_eq!(history.additional_information["original_status"], "");
        assert_eq!(history.additional_information["new_status"], "processing");
    }

    #[tokio::test]
    async fn second_call_is_refused() {
        let harness = TestHarness::new(5);
        harness.add_order(20, 1);

        let first = MarkOrderAsProcessing::new(20).execute(&harness.ctx).await;
        assert_eq!(first.record.as_ref().unwrap().attempts, 1);

        let second = MarkOrderAsProcessing::new(20).execute(&harness.ctx).await;

        assert!(!second.success);
        assert_eq!(second.outcome, ActionOutcome::Noop);
        let record = second.record.unwrap();
        assert_eq!(record.status, SyncStatus::Processing);
        assert_eq!(record.attempts, 1);

        // Refusals are audited too.
        let history = harness.history.all();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].result, ActionOutcome::Noop);
    }

    #[tokio::test]
    async fn queued_record_increments_attempts() {
        let harness = TestHarness::new(5);
        harness.add_order(20, 1);

        let mut record = crate::model::SyncOrderRecord::new(20, 1);
        record.status = SyncStatus::Retry;
        record.attempts = 2;
        harness.sync_orders.save(&record).await.unwrap();

        let result = MarkOrderAsProcessing::new(20).execute(&harness.ctx).await;

        assert!(result.success);
        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Processing);
        assert_eq!(record.attempts, 3);
    }

    #[tokio::test]
    async fn save_failure_is_captured() {
        let harness = TestHarness::new(5);
        harness.add_order(20, 1);
        harness.sync_orders.fail_next_save();

        let result = MarkOrderAsProcessing::new(20).execute(&harness.ctx).await;

        assert!(!result.success);
        let record = result.record.unwrap();
        assert_eq!(record.id, None);
        assert_eq!(record.status, SyncStatus::Processing);
        assert!(result.history.is_none());
    }
}
