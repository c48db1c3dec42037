//! Unified error type for the sync subsystem
//!
//! Action-layer entry points mostly *capture* failures into their result
//! object; `SyncError` covers the cases that are genuine errors: invalid
//! arguments, structural preconditions, and storage/transport faults
//! surfaced by repositories and orchestrators.

use crate::status::SyncStatus;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // ========== Invalid arguments ==========
    #[error("invalid result status '{0}': expected one of synced, error, partial")]
    InvalidResultStatus(SyncStatus),

    #[error("order is not valid for sync processing: no entity id assigned")]
    OrderNotValid,

    // ========== Structural preconditions ==========
    #[error("no stores are enabled for order sync; enable sync or pass --ignore-sync-enabled-flag")]
    NoStoresEnabled,

    #[error("no valid order ids supplied")]
    NoValidOrderIds,

    // ========== Parsing ==========
    #[error("unknown sync status: {0}")]
    UnknownStatus(String),

    #[error("unknown history action: {0}")]
    UnknownAction(String),

    #[error("unknown action outcome: {0}")]
    UnknownOutcome(String),

    // ========== Infrastructure ==========
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Internal(String),
}

impl SyncError {
    /// Internal error with a custom message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Transport error with a custom message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Result alias used across the crate.
pub type SyncResult<T> = Result<T, SyncError>;
