//! In-memory test doubles
//!
//! Deterministic implementations of the repository and collaborator traits
//! used by the unit tests and available to downstream consumers for their
//! own tests. The repositories can be told to fail the next save to
//! exercise the soft-failure paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::ActionContext;
use crate::config::{StoreSettings, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::migrate::{LegacySendFlag, LegacySendFlagReader};
use crate::model::{SyncOrderHistoryRecord, SyncOrderRecord};
use crate::orders::{OrderLookup, OrderRef};
use crate::repository::{SyncOrderHistoryRepository, SyncOrderQuery, SyncOrderRepository};
use crate::transport::{DispatchOutcome, DispatchStatus, ItemVerdict, ProcessEvents, Verdict};

/// Bundle of memory doubles wired into an [`ActionContext`].
pub struct TestHarness {
    pub ctx: ActionContext,
    pub sync_orders: Arc<MemorySyncOrderRepository>,
    pub history: Arc<MemorySyncOrderHistoryRepository>,
    pub orders: Arc<MemoryOrderLookup>,
}

impl TestHarness {
    /// Harness with the given retry threshold and one sync-enabled store
    /// (store id 1, API key "test-key").
    pub fn new(max_attempts: i32) -> Self {
        let config = SyncConfig::new(max_attempts).with_store(
            1,
            StoreSettings {
                sync_enabled: true,
                api_key: Some("test-key".to_string()),
                ..StoreSettings::default()
            },
        );
        Self::with_config(config)
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let sync_orders = Arc::new(MemorySyncOrderRepository::new());
        let history = Arc::new(MemorySyncOrderHistoryRepository::new());
        let orders = Arc::new(MemoryOrderLookup::new());
        let ctx = ActionContext {
            sync_orders: sync_orders.clone(),
            history: history.clone(),
            orders: orders.clone(),
            config: Arc::new(config),
        };
        Self {
            ctx,
            sync_orders,
            history,
            orders,
        }
    }

    /// Register a host order for `order_id` in store `store_id`.
    pub fn add_order(&self, order_id: i64, store_id: i64) {
        self.orders.insert(OrderRef {
            id: order_id,
            store_id,
            increment_id: format!("1{order_id:08}"),
        });
    }
}

/// [`SyncOrderRepository`] over a `HashMap`.
#[derive(Default)]
pub struct MemorySyncOrderRepository {
    records: Mutex<HashMap<i64, SyncOrderRecord>>,
    next_id: AtomicI64,
    fail_next_save: AtomicBool,
}

impl MemorySyncOrderRepository {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            fail_next_save: AtomicBool::new(false),
        }
    }

    /// Make the next `save` call fail with a storage error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, SyncOrderRecord>> {
        self.records.lock().unwrap()
    }
}

#[async_trait]
impl SyncOrderRepository for MemorySyncOrderRepository {
    async fn get(&self, id: i64) -> SyncResult<Option<SyncOrderRecord>> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn get_by_order_id(&self, order_id: i64) -> SyncResult<Option<SyncOrderRecord>> {
        Ok(self
            .lock()
            .values()
            .find(|r| r.order_id == order_id)
            .cloned())
    }

    async fn save(&self, record: &SyncOrderRecord) -> SyncResult<SyncOrderRecord> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(SyncError::internal("simulated save failure"));
        }

        let mut stored = record.clone();
        let id = match record.id {
            Some(id) => id,
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        stored.id = Some(id);
        self.lock().insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> SyncResult<()> {
        self.lock().remove(&id);
        Ok(())
    }

    async fn list(&self, query: &SyncOrderQuery) -> SyncResult<Vec<SyncOrderRecord>> {
        let mut records: Vec<SyncOrderRecord> = self
            .lock()
            .values()
            .filter(|r| {
                (query.order_ids.is_empty() || query.order_ids.contains(&r.order_id))
                    && (query.store_ids.is_empty() || query.store_ids.contains(&r.store_id))
                    && (query.statuses.is_empty() || query.statuses.contains(&r.status))
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        if let Some(limit) = query.page_size {
            records.truncate(limit as usize);
        }
        Ok(records)
    }

    fn clear_cache(&self) {}
}

/// [`SyncOrderHistoryRepository`] over a `Vec`.
#[derive(Default)]
pub struct MemorySyncOrderHistoryRepository {
    rows: Mutex<Vec<SyncOrderHistoryRecord>>,
    next_id: AtomicI64,
    fail_next_save: AtomicBool,
}

impl MemorySyncOrderHistoryRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_next_save: AtomicBool::new(false),
        }
    }

    /// Make the next `save` call fail with a storage error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Snapshot of every stored row, in insertion order.
    pub fn all(&self) -> Vec<SyncOrderHistoryRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncOrderHistoryRepository for MemorySyncOrderHistoryRepository {
    async fn save(&self, record: &SyncOrderHistoryRecord) -> SyncResult<SyncOrderHistoryRecord> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(SyncError::internal("simulated history save failure"));
        }

        let mut rows = self.rows.lock().unwrap();
        let mut stored = record.clone();
        match record.id {
            Some(id) => {
                if let Some(row) = rows.iter_mut().find(|r| r.id == Some(id)) {
                    *row = stored.clone();
                }
            }
            None => {
                stored.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst));
                rows.push(stored.clone());
            }
        }
        Ok(stored)
    }

    async fn get_by_sync_order_id(
        &self,
        sync_order_id: i64,
    ) -> SyncResult<Vec<SyncOrderHistoryRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.sync_order_id == sync_order_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> SyncResult<()> {
        self.rows.lock().unwrap().retain(|r| r.id != Some(id));
        Ok(())
    }
}

/// [`OrderLookup`] over a `HashMap`, with host order statuses for the
/// queue-candidate query.
#[derive(Default)]
pub struct MemoryOrderLookup {
    orders: Mutex<HashMap<i64, (OrderRef, String)>>,
}

impl MemoryOrderLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: OrderRef) {
        self.insert_with_status(order, "complete");
    }

    pub fn insert_with_status(&self, order: OrderRef, status: &str) {
        self.orders
            .lock()
            .unwrap()
            .insert(order.id, (order, status.to_string()));
    }
}

#[async_trait]
impl OrderLookup for MemoryOrderLookup {
    async fn get_order(&self, order_id: i64) -> SyncResult<Option<OrderRef>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .get(&order_id)
            .map(|(order, _)| order.clone()))
    }

    async fn order_ids_for_stores(
        &self,
        store_ids: &[i64],
        excluded_statuses: &HashSet<String>,
    ) -> SyncResult<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|(order, status)| {
                (store_ids.is_empty() || store_ids.contains(&order.store_id))
                    && !excluded_statuses.contains(status)
            })
            .map(|(order, _)| order.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// [`LegacySendFlagReader`] over a per-store map.
#[derive(Default)]
pub struct MemoryLegacySendFlagReader {
    flags: Mutex<HashMap<i64, Vec<LegacySendFlag>>>,
}

impl MemoryLegacySendFlagReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, store_id: i64, flag: LegacySendFlag) {
        self.flags.lock().unwrap().entry(store_id).or_default().push(flag);
    }
}

#[async_trait]
impl LegacySendFlagReader for MemoryLegacySendFlagReader {
    async fn send_flags_for_store(&self, store_id: i64) -> SyncResult<Vec<LegacySendFlag>> {
        Ok(self
            .flags
            .lock()
            .unwrap()
            .get(&store_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// [`ProcessEvents`] double that returns a fixed verdict per item, or plays
/// back scripted outcomes, while recording every dispatched batch.
pub struct ScriptedProcessEvents {
    default_verdict: Verdict,
    script: Mutex<VecDeque<DispatchOutcome>>,
    calls: Mutex<Vec<Vec<i64>>>,
}

impl ScriptedProcessEvents {
    /// Every item in every batch succeeds.
    pub fn always_success() -> Self {
        Self::with_default(Verdict::Success)
    }

    /// Every item in every batch fails.
    pub fn always_fail() -> Self {
        Self::with_default(Verdict::Fail)
    }

    fn with_default(verdict: Verdict) -> Self {
        Self {
            default_verdict: verdict,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue an outcome to be returned for the next dispatch; once the
    /// script is exhausted the default verdict applies again.
    pub fn push_outcome(&self, outcome: DispatchOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Order ids of every dispatched batch, in call order.
    pub fn dispatched_batches(&self) -> Vec<Vec<i64>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessEvents for ScriptedProcessEvents {
    async fn execute(&self, batch: &[SyncOrderRecord], _via: &str) -> SyncResult<DispatchOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push(batch.iter().map(|r| r.order_id).collect());

        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return Ok(outcome);
        }

        let items: Vec<ItemVerdict> = batch
            .iter()
            .map(|record| ItemVerdict {
                order_id: record.order_id,
                store_id: record.store_id,
                verdict: self.default_verdict,
            })
            .collect();
        let status = match self.default_verdict {
            Verdict::Success => DispatchStatus::Success,
            Verdict::Error | Verdict::Fail => DispatchStatus::Partial,
        };
        Ok(DispatchOutcome {
            status,
            items,
            messages: Vec::new(),
        })
    }
}
