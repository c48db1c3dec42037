//! Transport collaborator: dispatching order batches for ingestion
//!
//! The analytics event payload format is owned by the transport; this
//! subsystem only cares about the per-item verdicts that come back. The
//! bundled HTTP adapter posts a minimal JSON batch the way the platform's
//! ingestion endpoints are called elsewhere.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConfigProvider;
use crate::error::{SyncError, SyncResult};
use crate::model::SyncOrderRecord;

/// Overall result of one batch dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Success,
    Partial,
    Noop,
}

/// Per-order verdict from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Error,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemVerdict {
    pub order_id: i64,
    pub store_id: i64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    pub items: Vec<ItemVerdict>,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Dispatches one selected batch of sync-order records.
#[async_trait]
pub trait ProcessEvents: Send + Sync {
    async fn execute(&self, batch: &[SyncOrderRecord], via: &str) -> SyncResult<DispatchOutcome>;
}

#[derive(Debug, Serialize)]
struct BatchItem {
    order_id: i64,
    store_id: i64,
    ip_address_attribute: String,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    via: &'a str,
    orders: Vec<BatchItem>,
}

/// [`ProcessEvents`] over HTTP: POSTs the batch to an ingestion endpoint
/// and decodes the per-item verdicts from the JSON response.
pub struct HttpProcessEvents {
    client: reqwest::Client,
    endpoint: String,
    config: Arc<dyn ConfigProvider>,
}

impl HttpProcessEvents {
    /// `endpoint` is the base URL of the ingestion service.
    pub fn new(endpoint: String, config: Arc<dyn ConfigProvider>) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }
}

#[async_trait]
impl ProcessEvents for HttpProcessEvents {
    async fn execute(&self, batch: &[SyncOrderRecord], via: &str) -> SyncResult<DispatchOutcome> {
        let request = BatchRequest {
            via,
            orders: batch
                .iter()
                .map(|record| BatchItem {
                    order_id: record.order_id,
                    store_id: record.store_id,
                    ip_address_attribute: self.config.ip_address_attribute(record.store_id),
                })
                .collect(),
        };

        let url = format!("{}/order-events", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::transport(format!("dispatch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::transport(format!(
                "ingestion endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<DispatchOutcome>()
            .await
            .map_err(|e| SyncError::transport(format!("invalid dispatch response: {e}")))
    }
}
