//! Sync status, history action and outcome enums
//!
//! String labels round-trip to the database columns and transport payloads,
//! so the variants here are the single source of truth for the lifecycle
//! vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Lifecycle status of one order's sync record.
///
/// `NotRegistered` is the implicit status of an order with no record yet; it
/// is never stored, only reported (e.g. as the `original_status` of a first
/// transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NotRegistered,
    Queued,
    Processing,
    Retry,
    Synced,
    Error,
    Partial,
}

impl SyncStatus {
    /// Whether a batch run will pick the order up in this status.
    ///
    /// `Processing` is excluded (a run is already in flight), `Synced` and
    /// `Error` are terminal until something re-queues them.
    pub fn can_initiate_sync(&self) -> bool {
        matches!(self, Self::Queued | Self::Retry | Self::Partial)
    }

    /// Whether this status is a legal outcome for marking an order processed.
    pub fn is_terminal_result(&self) -> bool {
        matches!(self, Self::Synced | Self::Error | Self::Partial)
    }

    /// Stable label used in the database and in history metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Retry => "retry",
            Self::Synced => "synced",
            Self::Error => "error",
            Self::Partial => "partial",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_registered" => Ok(Self::NotRegistered),
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "retry" => Ok(Self::Retry),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            "partial" => Ok(Self::Partial),
            other => Err(SyncError::UnknownStatus(other.to_string())),
        }
    }
}

/// Kind of transition recorded in a history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Queue,
    ProcessStart,
    ProcessEnd,
    Migrate,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::ProcessStart => "process_start",
            Self::ProcessEnd => "process_end",
            Self::Migrate => "migrate",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(Self::Queue),
            "process_start" => Ok(Self::ProcessStart),
            "process_end" => Ok(Self::ProcessEnd),
            "migrate" => Ok(Self::Migrate),
            other => Err(SyncError::UnknownAction(other.to_string())),
        }
    }
}

/// Outcome recorded for a transition attempt.
///
/// A genuine persistence failure is carried as an error message on the
/// action result, never as an outcome variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    Noop,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Noop => "noop",
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionOutcome {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "noop" => Ok(Self::Noop),
            other => Err(SyncError::UnknownOutcome(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pickup_eligible_statuses() {
        assert!(SyncStatus::Queued.can_initiate_sync());
        assert!(SyncStatus::Retry.can_initiate_sync());
        assert!(SyncStatus::Partial.can_initiate_sync());

        assert!(!SyncStatus::NotRegistered.can_initiate_sync());
        assert!(!SyncStatus::Processing.can_initiate_sync());
        assert!(!SyncStatus::Synced.can_initiate_sync());
        assert!(!SyncStatus::Error.can_initiate_sync());
    }

    #[test]
    fn terminal_result_statuses() {
        assert!(SyncStatus::Synced.is_terminal_result());
        assert!(SyncStatus::Error.is_terminal_result());
        assert!(SyncStatus::Partial.is_terminal_result());
        assert!(!SyncStatus::Queued.is_terminal_result());
        assert!(!SyncStatus::Retry.is_terminal_result());
        assert!(!SyncStatus::Processing.is_terminal_result());
    }

    #[test]
    fn status_labels_round_trip() {
        for status in [
            SyncStatus::NotRegistered,
            SyncStatus::Queued,
            SyncStatus::Processing,
            SyncStatus::Retry,
            SyncStatus::Synced,
            SyncStatus::Error,
            SyncStatus::Partial,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn action_labels_round_trip() {
        for action in [
            HistoryAction::Queue,
            HistoryAction::ProcessStart,
            HistoryAction::ProcessEnd,
            HistoryAction::Migrate,
        ] {
            assert_eq!(action.as_str().parse::<HistoryAction>().unwrap(), action);
        }
    }
}
