//! MarkOrderAsProcessed action
//!
//! Records the outcome of a sync attempt. `Partial` is not terminal: it
//! re-enters the pickup-eligible pool, so its history row is labelled as a
//! queue transition rather than a process end.

use crate::error::{SyncError, SyncResult};
use crate::model::AdditionalInformation;
use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

use super::{
    ActionContext, ActionResult, append_history, persist_record, resolve_or_create,
    transition_metadata,
};

/// Record the result of one order's sync attempt.
#[derive(Debug, Clone)]
pub struct MarkOrderAsProcessed {
    pub order_id: i64,
    pub result_status: SyncStatus,
    pub via: String,
    pub additional_information: AdditionalInformation,
}

impl MarkOrderAsProcessed {
    pub fn new(order_id: i64, result_status: SyncStatus) -> Self {
        Self {
            order_id,
            result_status,
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

    /// Errors when `result_status` is not one of `Synced`, `Error`,
    /// `Partial` — the one action-layer entry point with a raised
    /// invalid-argument failure.
    pub async fn execute(&self, ctx: &ActionContext) -> SyncResult<ActionResult> {
        if !self.result_status.is_terminal_result() {
            return Err(SyncError::InvalidResultStatus(self.result_status));
        }

        let resolved = match resolve_or_create(ctx, self.order_id).await {
            Ok(resolved) => resolved,
            Err(message) => return Ok(ActionResult::failed(message)),
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

        if original_status == self.result_status {
            result.success = false;
            result.outcome = ActionOutcome::Noop;
            result.messages.push(format!(
                "Order is already in a {} state",
                self.result_status
            ));
        } else {
            record.status = self.result_status;
        }

        let Some(stored) = persist_record(ctx, &mut result, record).await else {
            return Ok(result);
        };

        // Partial failure re-enters the queue-eligible pool.
        let action = match self.result_status {
            SyncStatus::Partial => HistoryAction::Queue,
            _ => HistoryAction::ProcessEnd,
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
    use crate::repository::SyncOrderRepository;
    use crate::testing::TestHarness;

    async fn processing_record(harness: &TestHarness, order_id: i64, attempts: i32) {
        harness.add_order(order_id, 1);
        let mut record = crate::model::SyncOrderRecord::new(order_id, 1);
        record.status = SyncStatus::Processing;
        record.attempts = attempts;
        harness.sync_orders.save(&record).await.unwrap();
    }

    #[tokio::test]
    async fn synced_result_ends_processing() {
        let harness = TestHarness::new(5);
        processing_record(&harness, 30, 1).await;

        let result = MarkOrderAsProcessed::new(30, SyncStatus::Synced)
            .via("Cron")
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert!(result.success);
        let record = result.record.unwrap();
        assert_eq!(record.status, SyncStatus::Synced);
        assert_eq!(record.attempts, 1);

        let history = result.history.unwrap();
        assert_eq!(history.action, HistoryAction::ProcessEnd);
        assert_eq!(history.additional_information["new_status"], "synced");
    }

    #[tokio::test]
    async fn partial_result_uses_queue_action() {
        let harness = TestHarness::new(5);
        processing_record(&harness, 30, 2).await;

        let result = MarkOrderAsProcessed::new(30, SyncStatus::Partial)
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.record.unwrap().status, SyncStatus::Partial);
        assert_eq!(result.history.unwrap().action, HistoryAction::Queue);
    }

    #[tokio::test]
    async fn invalid_result_status_is_rejected() {
        let harness = TestHarness::new(5);
        harness.add_order(30, 1);

        for status in [
            SyncStatus::NotRegistered,
            SyncStatus::Queued,
            SyncStatus::Processing,
            SyncStatus::Retry,
        ] {
            let err = MarkOrderAsProcessed::new(30, status)
                .execute(&harness.ctx)
                .await
                .unwrap_err();
            assert!(
                matches!(err, SyncError::InvalidResultStatus(s) if s == status),
                "status {status}"
            );
        }

        // Nothing was persisted by the rejected calls.
        assert!(
            harness
                .sync_orders
                .get_by_order_id(30)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn already_terminal_is_noop_with_audit_row() {
        let harness = TestHarness::new(5);
        harness.add_order(30, 1);
        let mut record = crate::model::SyncOrderRecord::new(30, 1);
        record.status = SyncStatus::Error;
        record.attempts = 4;
        harness.sync_orders.save(&record).await.unwrap();

        let result = MarkOrderAsProcessed::new(30, SyncStatus::Error)
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.outcome, ActionOutcome::Noop);
        assert_eq!(result.record.unwrap().attempts, 4);

        let history = harness.history.all();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result, ActionOutcome::Noop);
    }

    #[tokio::test]
    async fn attempts_never_change() {
        let harness = TestHarness::new(5);
        processing_record(&harness, 30, 3).await;

        let result = MarkOrderAsProcessed::new(30, SyncStatus::Error)
            .execute(&harness.ctx)
            .await
            .unwrap();

        assert_eq!(result.record.unwrap().attempts, 3);
    }
}
